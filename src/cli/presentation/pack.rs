//! Pack presentation: generate, show, list, key, and resolve output.

use crate::api::ServedPack;
use crate::cli::presentation::shared::{format_section_heading, tier_label};
use crate::error::OverlayError;
use crate::key::CacheKey;
use crate::types::{OverlayPack, RepairIntent, WorkspaceType};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde_json::json;

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, OverlayError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| OverlayError::ParseError(format!("Failed to render JSON: {}", e)))
}

pub fn format_pack_text(pack: &OverlayPack) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Overlay Pack")));
    out.push_str(&format!("  Id: {}\n", pack.id));
    out.push_str(&format!("  Family: {}\n", pack.vehicle_family));
    out.push_str(&format!("  Workspace: {}\n", pack.workspace_type));
    out.push_str(&format!("  Tier: {}\n", tier_label(pack.tier)));
    match pack.image_url() {
        Some(url) => out.push_str(&format!("  Image: {}\n", url)),
        None => {
            let shapes = pack.vector_scene().map(|s| s.shapes.len()).unwrap_or(0);
            out.push_str(&format!("  Vector scene: {} shapes\n", shapes));
        }
    }
    out.push_str(&format!(
        "  Canvas: {}x{}\n",
        pack.canvas.width, pack.canvas.height
    ));
    out.push_str(&format!("  Provider: {}\n", pack.provider_tag));
    out.push_str(&format!("  Generated: {}\n", pack.generated_at.to_rfc3339()));
    out.push_str(&format!("  Usage count: {}\n\n", pack.usage_count));

    out.push_str(&format!("{}\n\n", format_section_heading("Parts")));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Part", "Type", "Access", "Color", "Points", "Path"]);
    for (name, part) in &pack.parts {
        let path = if pack.access_paths.contains_key(name) {
            "yes"
        } else {
            "-"
        };
        table.add_row(vec![
            name.clone(),
            part.part_type.clone(),
            part.accessibility.as_str().to_string(),
            part.highlight_color.clone(),
            part.polygon.len().to_string(),
            path.to_string(),
        ]);
    }
    out.push_str(&format!("{}\n", table));

    if !pack.layers.is_empty() {
        out.push_str(&format!("\n{}\n\n", format_section_heading("Cutaway layers")));
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Layer", "Label", "Tint", "Opacity"]);
        for (name, layer) in &pack.layers {
            table.add_row(vec![
                name.clone(),
                layer.label.clone(),
                layer.tint_color.clone(),
                format!("{:.2}", layer.cutaway_opacity),
            ]);
        }
        out.push_str(&format!("{}\n", table));
    }
    out
}

pub fn format_pack_json(pack: &OverlayPack) -> Result<String, OverlayError> {
    to_json(pack)
}

pub fn format_served_text(served: &ServedPack) -> String {
    let mut out = format_pack_text(&served.pack);
    out.push_str(&format!("\n  Key: {}\n", served.key));
    out.push_str(&format!("  Origin: {}\n", served.origin.as_str()));
    if !served.trace.is_empty() {
        let states: Vec<&str> = served.trace.iter().map(|s| s.as_str()).collect();
        out.push_str(&format!("  Trace: {}\n", states.join(" -> ")));
        out.push_str(&format!("  Stored: {}\n", if served.stored { "yes" } else { "no" }));
    }
    out
}

pub fn format_served_json(served: &ServedPack) -> Result<String, OverlayError> {
    to_json(served)
}

pub fn format_pack_list_text(packs: &[OverlayPack]) -> String {
    if packs.is_empty() {
        return "No cached packs.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Key", "Tier", "Parts", "Uses", "Generated"]);
    for pack in packs {
        table.add_row(vec![
            CacheKey::new(pack.vehicle_family.clone(), pack.workspace_type).to_string(),
            tier_label(pack.tier),
            pack.parts.len().to_string(),
            pack.usage_count.to_string(),
            pack.generated_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    format!(
        "{}\n\n{}\n\nTotal: {}",
        format_section_heading("Cached Packs"),
        table,
        packs.len()
    )
}

pub fn format_pack_list_json(packs: &[OverlayPack]) -> Result<String, OverlayError> {
    let rows: Vec<serde_json::Value> = packs
        .iter()
        .map(|p| {
            json!({
                "key": CacheKey::new(p.vehicle_family.clone(), p.workspace_type).to_string(),
                "id": p.id,
                "tier": p.tier,
                "parts": p.parts.len(),
                "usage_count": p.usage_count,
                "generated_at": p.generated_at.to_rfc3339(),
            })
        })
        .collect();
    to_json(&json!({ "packs": rows, "total": packs.len() }))
}

pub fn format_key_text(key: &CacheKey) -> String {
    format!("Key: {}\nPack id: {}", key, key.pack_id())
}

pub fn format_resolve_text(repair: &RepairIntent, workspace: WorkspaceType) -> String {
    format!(
        "Repair: {}\nTarget part: {}\nWorkspace: {} ({})",
        repair.as_str(),
        repair.target_part(),
        workspace,
        workspace.describe()
    )
}
