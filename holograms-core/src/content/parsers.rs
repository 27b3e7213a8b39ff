use super::ContentParser;
use crate::render::{EntityLine, HeadLine, IconLine, Payload, TextLine};
use holograms_io::ItemStack;

fn strip_marker<'a>(content: &'a str, marker: &str) -> Option<&'a str> {
    content.strip_prefix(marker).map(str::trim)
}

/// Fallback: everything is text.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextParser;

impl ContentParser for TextParser {
    fn name(&self) -> &'static str {
        "text"
    }

    fn parse(&self, content: &str) -> Option<Payload> {
        Some(Payload::Text(TextLine::new(content)))
    }
}

/// `#ICON:<item>`
#[derive(Debug, Default, Clone, Copy)]
pub struct IconParser;

impl ContentParser for IconParser {
    fn name(&self) -> &'static str {
        "icon"
    }

    fn parse(&self, content: &str) -> Option<Payload> {
        strip_marker(content, "#ICON:").map(|rest| Payload::Icon(IconLine::new(ItemStack::parse(rest))))
    }
}

/// `#HEAD:<item>`
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadParser;

impl ContentParser for HeadParser {
    fn name(&self) -> &'static str {
        "head"
    }

    fn parse(&self, content: &str) -> Option<Payload> {
        strip_marker(content, "#HEAD:").map(|rest| Payload::Head(HeadLine::new(ItemStack::parse(rest))))
    }
}

/// `#SMALLHEAD:<item>`
#[derive(Debug, Default, Clone, Copy)]
pub struct SmallHeadParser;

impl ContentParser for SmallHeadParser {
    fn name(&self) -> &'static str {
        "small_head"
    }

    fn parse(&self, content: &str) -> Option<Payload> {
        strip_marker(content, "#SMALLHEAD:")
            .map(|rest| Payload::Head(HeadLine::small(ItemStack::parse(rest))))
    }
}

/// `#ENTITY:<type>`
#[derive(Debug, Default, Clone, Copy)]
pub struct EntityParser;

impl ContentParser for EntityParser {
    fn name(&self) -> &'static str {
        "entity"
    }

    fn parse(&self, content: &str) -> Option<Payload> {
        strip_marker(content, "#ENTITY:")
            .filter(|rest| !rest.is_empty())
            .map(|rest| Payload::Entity(EntityLine::new(rest)))
    }
}
