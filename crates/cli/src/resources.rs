use color_eyre::Result;
use storeroom_api::{FieldKind, ResourceCatalog, ServerConfig};

pub fn handle_resources_command(config: &ServerConfig) -> Result<()> {
    let catalog = ResourceCatalog::default_catalog()?;

    println!("📦 {} resources (locales: {})", catalog.len(), config.locales.join(", "));
    for definition in catalog.iter() {
        println!();
        println!(
            "{}  {}  (id: {}{})",
            definition.name,
            definition.collection,
            definition.id_field,
            if definition.multipart { ", multipart upload" } else { "" }
        );
        println!("  scopes: {} / {}", definition.read_scope, definition.write_scope);
        for rule in &definition.fields {
            let marker = if rule.required { "*" } else { " " };
            let default = rule
                .default
                .as_ref()
                .map(|value| format!(" = {value}"))
                .unwrap_or_default();
            println!("  {marker} {:<24} {}{default}", rule.name, describe_kind(&rule.kind));
        }
    }

    Ok(())
}

fn describe_kind(kind: &FieldKind) -> String {
    match kind {
        FieldKind::Text { max_len } => format!("string(max {max_len})"),
        FieldKind::Email => "email".to_string(),
        FieldKind::Integer { min, max } => format!("int[{min}..{max}]"),
        FieldKind::Decimal { min, max } => format!("numeric[{min}..{max}]"),
        FieldKind::Boolean => "bool".to_string(),
        FieldKind::Localized => "localized string".to_string(),
        FieldKind::Reference { resource } => format!("-> {resource}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_kind() {
        assert_eq!(describe_kind(&FieldKind::text(64)), "string(max 64)");
        assert_eq!(describe_kind(&FieldKind::reference("customers")), "-> customers");
        assert_eq!(
            describe_kind(&FieldKind::Decimal { min: 0.0, max: 100.0 }),
            "numeric[0..100]"
        );
    }
}
