//! Derives entities from an event payload per the bit-exact normalization
//! rules. The wire payload is treated as opaque, so extraction reads a
//! fixed set of well-known field names; any field that parses cleanly
//! under its type's normalization rule becomes an entity.

use ransomeye_types::entity::{Entity, EntityType};
use ransomeye_types::normalize;

pub fn extract_entities(payload: &serde_json::Value) -> Vec<Entity> {
    let mut entities = Vec::new();

    if let Some(host) = payload.get("host").and_then(|v| v.as_str()) {
        entities.push(Entity::new(EntityType::Host, host.to_lowercase()));
    }
    if let Some(ip) = payload.get("ip").and_then(|v| v.as_str()) {
        if let Some(normalized) = normalize::normalize_ipv4(ip).or_else(|| normalize::normalize_ipv6(ip)) {
            entities.push(Entity::new(EntityType::Ip, normalized));
        }
    }
    if let Some(domain) = payload.get("domain").and_then(|v| v.as_str()) {
        entities.push(Entity::new(EntityType::Domain, normalize::normalize_domain(domain)));
    }
    if let Some(hash) = payload.get("file_hash").and_then(|v| v.as_str()) {
        let tag = payload.get("file_hash_algo").and_then(|v| v.as_str()).unwrap_or("sha256");
        entities.push(Entity::new(EntityType::FileHash, normalize::normalize_file_hash(tag, hash)));
    }
    if let Some(user) = payload.get("user").and_then(|v| v.as_str()) {
        let realm = payload.get("user_realm").and_then(|v| v.as_str());
        let windows = payload.get("user_domain_style").and_then(|v| v.as_str()).map(|s| s == "windows").unwrap_or(false);
        entities.push(Entity::new(EntityType::User, normalize::normalize_user(user, realm, windows)));
    }
    if let Some(url) = payload.get("url").and_then(|v| v.as_str()) {
        if let Some(normalized) = normalize::normalize_url(url) {
            entities.push(Entity::new(EntityType::Url, normalized));
        }
    }
    if let (Some(exe), Some(cmd)) = (
        payload.get("process_executable").and_then(|v| v.as_str()),
        payload.get("process_command_line").and_then(|v| v.as_str()),
    ) {
        entities.push(Entity::new(EntityType::Process, normalize::normalize_process(exe, cmd)));
    }

    entities
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_known_fields_only() {
        let payload = serde_json::json!({"host": "WEB-01", "unrelated": "x"});
        let entities = extract_entities(&payload);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].kind, EntityType::Host);
        assert_eq!(entities[0].value, "web-01");
    }

    #[test]
    fn empty_payload_extracts_nothing() {
        assert!(extract_entities(&serde_json::json!({})).is_empty());
    }
}
