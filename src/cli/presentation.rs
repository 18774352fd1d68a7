//! CLI presentation: text and json formatters per command family.

mod pack;
mod shared;

pub use pack::{
    format_key_text, format_pack_json, format_pack_list_json, format_pack_list_text,
    format_pack_text, format_resolve_text, format_served_json, format_served_text,
};
pub use shared::{format_section_heading, tier_label};
