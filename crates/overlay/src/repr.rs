//! Textual rendering of element values.
//!
//! Rendering walks the value tree on demand. Every element visited on the way
//! down records its address; a pointer whose target address is already on the
//! current path renders as `...` instead of recursing, so cyclic object graphs
//! terminate. Each branch gets its own copy of the path, so siblings that
//! share a target are both rendered in full.

use crate::config::{ReprLayout, ReprOptions, ReprStyle};
use crate::element::{Element, View};
use crate::error::OverlayResult;
use crate::pointer::PointerView;

/// Rendered in place of a pointer target already on the current path.
pub const ELISION: &str = "...";

/// Rendered for a pointer holding address zero.
pub const NULL: &str = "NULL";

/// Render the current value of `element`.
pub fn render(element: &Element<'_>, options: &ReprOptions) -> OverlayResult<String> {
    Renderer { options }.element(element, Vec::new())
}

struct Renderer<'o> {
    options: &'o ReprOptions,
}

impl Renderer<'_> {
    fn rich(&self) -> bool {
        self.options.style == ReprStyle::Rich
    }

    fn element(&self, element: &Element<'_>, mut visited: Vec<u64>) -> OverlayResult<String> {
        visited.push(element.address());

        let text = match element.view()? {
            View::Pointer(pointer) => return self.pointer(&pointer, visited),
            View::Scalar(scalar) => {
                let value = scalar.get()?;
                if self.rich() {
                    format!("{}({})", scalar.kind().c_name(), value)
                } else {
                    value.to_string()
                }
            }
            View::Array(array) => {
                let items = array
                    .items()?
                    .iter()
                    .map(|item| self.element(item, visited.clone()))
                    .collect::<OverlayResult<Vec<_>>>()?;
                let body = format!("[{}]", self.body(&items));
                if self.rich() {
                    format!("{}({})", element.type_name(), body)
                } else {
                    body
                }
            }
            View::String(string) => {
                let text = format!("{:?}", string.get()?);
                if self.rich() {
                    format!("{}({})", element.type_name(), text)
                } else {
                    text
                }
            }
            View::Struct(structure) => {
                let fields = structure
                    .fields()
                    .map(|field| {
                        let (name, field) = field?;
                        Ok(format!("{}={}", name, self.element(&field, visited.clone())?))
                    })
                    .collect::<OverlayResult<Vec<_>>>()?;
                format!("{}({})", structure.name(), self.body(&fields))
            }
            View::Opaque(address) => format!("<void @ {:#x}>", address),
        };
        Ok(text)
    }

    fn pointer(&self, pointer: &PointerView<'_>, visited: Vec<u64>) -> OverlayResult<String> {
        let address = pointer.read()?;
        if address == 0 {
            return Ok(NULL.to_string());
        }
        if pointer.target_type().is_none() {
            return Ok(format!("Pointer(0x{:X})", address));
        }

        let child = if visited.contains(&address) {
            ELISION.to_string()
        } else {
            match pointer.dereference()? {
                Some(target) => self.element(&target, visited)?,
                None => NULL.to_string(),
            }
        };

        Ok(if self.rich() {
            format!("Pointer({})", child)
        } else if self.options.hide_pointers {
            child
        } else {
            format!("*{}", child)
        })
    }

    /// Join rendered members for the configured layout.
    fn body(&self, members: &[String]) -> String {
        if members.is_empty() {
            return String::new();
        }
        match self.options.layout {
            ReprLayout::Compact => members.join(", "),
            ReprLayout::Indented => {
                let lines: Vec<String> = members
                    .iter()
                    .map(|member| indent(member, self.options.indent))
                    .collect();
                format!("\n{}\n", lines.join(",\n"))
            }
        }
    }
}

/// Prefix every line of `text` with `width` spaces.
pub fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| format!("{}{}", pad, line))
        .collect::<Vec<_>>()
        .join("\n")
}
