//! CLI domain: parse, route, output, and presentation only.
//! No domain orchestration; single route table dispatches to the overlay service.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{command_name, Cli, Commands, ConfigCommands, VehicleArgs};
pub use presentation::{
    format_key_text, format_pack_json, format_pack_list_json, format_pack_list_text,
    format_pack_text, format_resolve_text, format_section_heading, format_served_json,
    format_served_text, tier_label,
};
pub use route::RunContext;
