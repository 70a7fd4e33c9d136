//! Overlays on this test process's own memory through `/proc/self/mem`.
#![cfg(target_os = "linux")]

use overlay::{
    ElementType, Length, Overlay, ProcessMemory, ReprOptions, ScalarKind, Schema, StructBuilder,
    Value,
};
use std::ffi::c_char;
use std::ptr;

#[repr(C)]
#[allow(dead_code)]
struct Node {
    value: i32,
    flag: u8,
    name: *const c_char,
    next: *mut Node,
}

#[repr(C)]
#[allow(dead_code)]
struct Buffer {
    len: isize,
    data: *const u16,
}

fn schema() -> Schema {
    let mut schema = Schema::new();
    schema
        .define(
            StructBuilder::new("Node")
                .field("value", ScalarKind::I32)
                .field("flag", ScalarKind::U8)
                .field("name", ElementType::pointer_to(ElementType::CString))
                .field("next", ElementType::pointer_to(ElementType::structure("Node"))),
        )
        .unwrap();
    schema
        .define(
            StructBuilder::new("Buffer")
                .field("len", ScalarKind::ISize)
                .field(
                    "data",
                    ElementType::pointer_to(ElementType::property_array(
                        ScalarKind::U16.into(),
                        Length::field("len"),
                    )),
                ),
        )
        .unwrap();
    schema
}

#[test]
fn layout_matches_repr_c() {
    let schema = schema();
    let node = schema.get("Node").unwrap();
    assert_eq!(node.size(), std::mem::size_of::<Node>());
    assert_eq!(node.alignment(), std::mem::align_of::<Node>());
    assert_eq!(node.offset_of("flag").unwrap(), std::mem::offset_of!(Node, flag));
    assert_eq!(node.offset_of("name").unwrap(), std::mem::offset_of!(Node, name));
    assert_eq!(node.offset_of("next").unwrap(), std::mem::offset_of!(Node, next));
}

#[test]
fn read_and_patch_live_list() {
    let first_name = b"first\0";
    let second_name = b"second\0";
    let mut second = Box::new(Node {
        value: 2,
        flag: 0,
        name: second_name.as_ptr() as *const c_char,
        next: ptr::null_mut(),
    });
    let first = Box::new(Node {
        value: 1,
        flag: 1,
        name: first_name.as_ptr() as *const c_char,
        next: &mut *second as *mut Node,
    });

    let schema = schema();
    let memory = ProcessMemory::open_self(true).unwrap();
    let overlay = Overlay::new(&schema, &memory);
    let view = overlay
        .structure("Node", &*first as *const Node as u64)
        .unwrap();

    assert_eq!(
        view.as_element().render(&ReprOptions::compact()).unwrap(),
        "Node(value=1, flag=1, name=\"first\", next=Node(value=2, flag=0, name=\"second\", next=NULL))"
    );

    let next_value = view.as_element().path("next.value").unwrap();
    next_value.set(&Value::from(-7i32)).unwrap();
    let seen = unsafe { ptr::read_volatile(&second.value) };
    assert_eq!(seen, -7);

    // Changes made behind the overlay's back are observed.
    unsafe { ptr::write_volatile(&mut second.flag, 9) };
    assert_eq!(
        view.as_element().path("next.flag").unwrap().get().unwrap(),
        Value::from(9u8)
    );
}

#[test]
fn live_property_array() {
    let mut data = vec![10u16, 20, 30];
    let buffer = Box::new(Buffer {
        len: 2,
        data: data.as_mut_ptr(),
    });

    let schema = schema();
    let memory = ProcessMemory::open_self(true).unwrap();
    let view = Overlay::new(&schema, &memory)
        .structure("Buffer", &*buffer as *const Buffer as u64)
        .unwrap();
    let items = view.field("data").unwrap().as_pointer().unwrap().target().unwrap();

    assert_eq!(
        items.get().unwrap(),
        Value::List(vec![Value::from(10u16), Value::from(20u16)])
    );

    view.set("len", &Value::from(3isize)).unwrap();
    items
        .set(&Value::List(vec![
            Value::from(1u16),
            Value::from(2u16),
            Value::from(3u16),
        ]))
        .unwrap();
    let seen: Vec<u16> = (0..3)
        .map(|i| unsafe { ptr::read_volatile(data.as_ptr().add(i)) })
        .collect();
    assert_eq!(seen, vec![1, 2, 3]);
    assert_eq!(unsafe { ptr::read_volatile(&buffer.len) }, 3);
}
