//! MCP tool definitions for Mnemonic

use serde_json::json;

use super::protocol::ToolDefinition;

/// All tool definitions for Mnemonic
pub const TOOL_DEFINITIONS: &[(&str, &str, &str)] = &[
    // Memory CRUD
    (
        "mnemonic_create",
        "Store a new memory with optional tags, recall triggers and importance weight.",
        r#"{
            "type": "object",
            "properties": {
                "title": {"type": "string", "maxLength": 200, "description": "Short title"},
                "content": {"type": "string", "description": "The content to remember"},
                "type": {"type": "string", "enum": ["memory", "learning", "milestone", "reference"], "default": "memory"},
                "tags": {"type": "array", "items": {"type": "string"}, "description": "Tags for categorization"},
                "triggers": {"type": "array", "items": {"type": "string"}, "description": "Phrases that should recall this memory"},
                "weight": {"type": "number", "minimum": 0.1, "maximum": 1, "default": 0.8, "description": "Base importance"},
                "pinned": {"type": "boolean", "default": false, "description": "Pinned memories never decay"},
                "emotional_flag": {"type": "boolean", "default": false, "description": "Emotionally significant memories decay slowly"},
                "metadata": {"type": "object", "description": "Additional metadata, stored verbatim"}
            },
            "required": ["title", "content"]
        }"#,
    ),
    (
        "mnemonic_get",
        "Retrieve a memory by its ID. Counts as an access.",
        r#"{
            "type": "object",
            "properties": {
                "id": {"type": "string", "description": "Memory ID"}
            },
            "required": ["id"]
        }"#,
    ),
    (
        "mnemonic_update",
        "Update an existing memory. Omitted fields are unchanged; tags and triggers replace the previous sets.",
        r#"{
            "type": "object",
            "properties": {
                "id": {"type": "string", "description": "Memory ID"},
                "title": {"type": "string", "maxLength": 200},
                "content": {"type": "string"},
                "type": {"type": "string", "enum": ["memory", "learning", "milestone", "reference"]},
                "tags": {"type": "array", "items": {"type": "string"}},
                "triggers": {"type": "array", "items": {"type": "string"}},
                "weight": {"type": "number", "minimum": 0.1, "maximum": 1},
                "pinned": {"type": "boolean"},
                "emotional_flag": {"type": "boolean"},
                "status": {"type": "string", "enum": ["active", "archived"]},
                "metadata": {"type": "object"}
            },
            "required": ["id"]
        }"#,
    ),
    (
        "mnemonic_delete",
        "Permanently delete a memory with its tag links and triggers",
        r#"{
            "type": "object",
            "properties": {
                "id": {"type": "string", "description": "Memory ID"}
            },
            "required": ["id"]
        }"#,
    ),
    (
        "mnemonic_search",
        "Search memories by text and/or tags. Results are ranked by relevance blended with decayed importance.",
        r#"{
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Words, \"quoted phrases\" or prefix* terms"},
                "tags": {"type": "array", "items": {"type": "string"}, "description": "All of these tags are required"},
                "status": {"type": "string", "enum": ["active", "archived", "all"], "default": "active"},
                "limit": {"type": "integer", "default": 20, "maximum": 100},
                "offset": {"type": "integer", "default": 0},
                "track_access": {"type": "boolean", "default": false, "description": "Count returned memories as accessed"}
            }
        }"#,
    ),
    (
        "mnemonic_list",
        "List memories with sorting and pagination",
        r#"{
            "type": "object",
            "properties": {
                "status": {"type": "string", "enum": ["active", "archived", "all"], "default": "active"},
                "sort_by": {"type": "string", "enum": ["created_at", "updated_at", "last_accessed_at", "weight", "access_count", "title"], "default": "updated_at"},
                "sort_order": {"type": "string", "enum": ["asc", "desc"], "default": "desc"},
                "limit": {"type": "integer", "default": 20, "maximum": 100},
                "offset": {"type": "integer", "default": 0}
            }
        }"#,
    ),
    (
        "mnemonic_pin",
        "Pin or unpin a memory. Pinned memories always rank at full weight.",
        r#"{
            "type": "object",
            "properties": {
                "id": {"type": "string", "description": "Memory ID"},
                "pinned": {"type": "boolean", "default": true}
            },
            "required": ["id"]
        }"#,
    ),
    (
        "mnemonic_triggers",
        "Find active memories whose trigger phrases occur in the given text",
        r#"{
            "type": "object",
            "properties": {
                "text": {"type": "string", "description": "Utterance to match against trigger phrases"},
                "limit": {"type": "integer", "default": 10}
            },
            "required": ["text"]
        }"#,
    ),
    // Export / import
    (
        "mnemonic_export",
        "Export every memory, tag and trigger as a versioned JSON document",
        r#"{
            "type": "object",
            "properties": {}
        }"#,
    ),
    (
        "mnemonic_import",
        "Import a document produced by mnemonic_export",
        r#"{
            "type": "object",
            "properties": {
                "document": {"type": "object", "description": "Export document"},
                "policy": {"type": "string", "enum": ["skip", "overwrite", "fail_fast"], "default": "skip", "description": "What to do with IDs that already exist"},
                "preserve_ids": {"type": "boolean", "default": true, "description": "Keep document IDs; false imports every record as a new copy"}
            },
            "required": ["document"]
        }"#,
    ),
    // Insights
    (
        "mnemonic_stats",
        "Get counts, weight distribution, stale memories and top tags",
        r#"{
            "type": "object",
            "properties": {}
        }"#,
    ),
    (
        "mnemonic_maintenance",
        "Report memories whose effective weight fell below the stale threshold, optionally archiving them",
        r#"{
            "type": "object",
            "properties": {
                "archive_stale": {"type": "boolean", "default": false}
            }
        }"#,
    ),
];

/// Get all tool definitions as ToolDefinition structs
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    TOOL_DEFINITIONS
        .iter()
        .map(|(name, description, schema)| ToolDefinition {
            name: name.to_string(),
            description: description.to_string(),
            input_schema: serde_json::from_str(schema).unwrap_or(json!({})),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schemas_parse() {
        for (name, _, schema) in TOOL_DEFINITIONS {
            let parsed: serde_json::Value = serde_json::from_str(schema)
                .unwrap_or_else(|e| panic!("schema for {} is invalid: {}", name, e));
            assert_eq!(parsed["type"], "object", "{}", name);
        }
    }

    #[test]
    fn test_tool_names_are_unique() {
        let mut names: Vec<&str> = TOOL_DEFINITIONS.iter().map(|(n, _, _)| *n).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), TOOL_DEFINITIONS.len());
        assert_eq!(get_tool_definitions().len(), 12);
    }
}
