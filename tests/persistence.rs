//! Tests for the scenario wire format, the persistence adapter and the local
//! draft store.
mod common;
use botflow::persistence::IMPORT_KEYS;
use botflow::prelude::*;
use common::{MockBackend, SAMPLE_SCENARIO_JSON, sample_document, sample_scenario};
use serde_json::{Value, json};
use tokio_test::block_on;

fn adapter(backend: &MockBackend) -> PersistenceAdapter<MockBackend> {
    PersistenceAdapter::new(backend.clone())
}

#[cfg(test)]
mod wire_format_tests {
    use super::*;

    #[test]
    fn test_load_resolves_kind_from_block_type() {
        let scenario = sample_scenario("bot");
        let kinds: Vec<_> = scenario.blocks.iter().map(|b| b.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                Some(BlockKind::Start),
                Some(BlockKind::Condition),
                Some(BlockKind::Message),
                Some(BlockKind::Button),
            ]
        );
        assert_eq!(scenario.admin_chat_id(), Some("123456789"));
    }

    #[test]
    fn test_load_falls_back_to_node_type() {
        let json = r#"{"nodes": [{"id": "a", "type": "delay", "position": {"x": 1, "y": 2},
                        "data": {"hours": "1", "minutes": 30}}], "edges": []}"#;
        let scenario = ScenarioDocument::from_json(json)
            .unwrap()
            .into_scenario("bot", &BlockRegistry::new())
            .unwrap();
        let block = &scenario.blocks[0];
        match block.data().content() {
            BlockContent::Delay(delay) => assert_eq!(delay.total_seconds(), 5400),
            other => panic!("expected delay content, got {:?}", other),
        }
    }

    #[test]
    fn test_edges_without_id_get_one() {
        let scenario = sample_scenario("bot");
        assert_eq!(scenario.edges.len(), 3);
        let generated = &scenario.edges[0];
        assert!(!generated.id.is_empty());
        assert_ne!(generated.id, "e2-3");
        assert_eq!(generated.handle(), "default");
    }

    #[test]
    fn test_duplicate_edge_ids_are_replaced() {
        let json = r#"{"nodes": [{"id": "a", "data": {"blockType": "message"}},
                                 {"id": "b", "data": {"blockType": "end"}}],
                       "edges": [{"id": "e", "source": "a", "target": "b"},
                                 {"id": "e", "source": "b", "target": "a"}]}"#;
        let scenario = ScenarioDocument::from_json(json)
            .unwrap()
            .into_scenario("bot", &BlockRegistry::new())
            .unwrap();
        assert_eq!(scenario.edges[0].id, "e");
        assert_ne!(scenario.edges[1].id, "e");
    }

    #[test]
    fn test_numeric_ids_are_accepted() {
        let json = r#"{"nodes": [{"id": 1, "data": {"blockType": "start"}},
                                 {"id": 2, "data": {"blockType": "end"}}],
                       "edges": [{"source": 1, "target": 2}]}"#;
        let scenario = ScenarioDocument::from_json(json)
            .unwrap()
            .into_scenario("bot", &BlockRegistry::new())
            .unwrap();
        assert_eq!(scenario.blocks[0].id(), "1");
        assert_eq!(scenario.edges[0].target, "2");
    }

    #[test]
    fn test_missing_and_duplicate_node_ids_are_rejected() {
        let registry = BlockRegistry::new();
        let missing = r#"{"nodes": [{"id": "a", "data": {}}, {"data": {"blockType": "end"}}]}"#;
        let err = ScenarioDocument::from_json(missing)
            .unwrap()
            .into_scenario("bot", &registry)
            .unwrap_err();
        assert_eq!(err, DocumentError::MissingNodeId { index: 1 });

        let duplicate = r#"{"nodes": [{"id": "a", "data": {}}, {"id": "a", "data": {}}]}"#;
        let err = ScenarioDocument::from_json(duplicate)
            .unwrap()
            .into_scenario("bot", &registry)
            .unwrap_err();
        assert_eq!(err, DocumentError::DuplicateNodeId("a".to_string()));
    }

    #[test]
    fn test_malformed_json_is_a_parse_error() {
        let err = ScenarioDocument::from_json("{ nodes: ").unwrap_err();
        assert!(matches!(err, DocumentError::JsonParseError(_)));
    }

    #[test]
    fn test_unknown_block_type_survives_round_trip() {
        let json = r#"{"nodes": [{"id": "x", "type": "editable",
                        "data": {"blockType": "quiz", "label": "Q1", "answers": [1, 2]}}]}"#;
        let scenario = ScenarioDocument::from_json(json)
            .unwrap()
            .into_scenario("bot", &BlockRegistry::new())
            .unwrap();
        let block = &scenario.blocks[0];
        assert_eq!(block.kind(), None);
        assert_eq!(block.tag(), "quiz");

        let saved = ScenarioDocument::from_scenario(&scenario);
        let node = &saved.nodes[0];
        assert_eq!(node.node_type.as_deref(), Some("quiz"));
        assert_eq!(node.data["blockType"], json!("quiz"));
        assert_eq!(node.data["answers"], json!([1, 2]));
        assert_eq!(node.data["label"], json!("Q1"));
    }

    #[test]
    fn test_known_block_with_bad_fields_is_kept_verbatim() {
        let json = r#"{"nodes": [{"id": "d", "data": {"blockType": "delay", "hours": "soon"}}]}"#;
        let scenario = ScenarioDocument::from_json(json)
            .unwrap()
            .into_scenario("bot", &BlockRegistry::new())
            .unwrap();
        let block = &scenario.blocks[0];
        assert_eq!(block.tag(), "delay");
        assert_eq!(block.kind(), None);
        let saved = ScenarioDocument::from_scenario(&scenario);
        assert_eq!(saved.nodes[0].data["hours"], json!("soon"));
    }

    #[test]
    fn test_registry_alias_resolves_legacy_tags() {
        let json = r#"{"nodes": [{"id": "k", "data": {"blockType": "keywords"}}]}"#;
        let registry = BlockRegistry::new().with_alias("keywords", BlockKind::KeywordProcessor);
        let scenario = ScenarioDocument::from_json(json)
            .unwrap()
            .into_scenario("bot", &registry)
            .unwrap();
        assert_eq!(scenario.blocks[0].kind(), Some(BlockKind::KeywordProcessor));
        assert_eq!(scenario.blocks[0].tag(), "keyword_processor");
    }

    #[test]
    fn test_invalid_admin_chat_id_is_dropped_on_load() {
        let json = r#"{"nodes": [], "edges": [], "adminChatId": "@support"}"#;
        let scenario = ScenarioDocument::from_json(json)
            .unwrap()
            .into_scenario("bot", &BlockRegistry::new())
            .unwrap();
        assert_eq!(scenario.admin_chat_id(), None);
    }

    #[test]
    fn test_save_writes_no_ui_keys() {
        let mut store = GraphStore::from_scenario(sample_scenario("bot"));
        store.select_block("1", true);
        store.select_edge("e2-3", true);
        let document = ScenarioDocument::from_scenario(&store.into_scenario("bot"));
        let value = serde_json::to_value(&document).unwrap();

        for node in value["nodes"].as_array().unwrap() {
            let keys: Vec<&str> = node.as_object().unwrap().keys().map(String::as_str).collect();
            assert_eq!(keys.len(), 4, "unexpected node keys {:?}", keys);
            for key in ["id", "type", "data", "position"] {
                assert!(keys.contains(&key));
            }
            assert!(node["data"].get("onChange").is_none());
            assert_eq!(node["type"], node["data"]["blockType"]);
        }
        for edge in value["edges"].as_array().unwrap() {
            let edge = edge.as_object().unwrap();
            for key in ["selected", "animated", "markerEnd", "style"] {
                assert!(!edge.contains_key(key));
            }
        }
    }

    #[test]
    fn test_round_trip_preserves_blocks_and_edges() {
        let original = sample_scenario("bot");
        let json = ScenarioDocument::from_scenario(&original).to_json_pretty().unwrap();
        let reloaded = ScenarioDocument::from_json(&json)
            .unwrap()
            .into_scenario("bot", &BlockRegistry::new())
            .unwrap();
        assert_eq!(reloaded, original);
    }

    #[test]
    fn test_lenient_button_fields() {
        let scenario = sample_scenario("bot");
        match scenario.block("4").unwrap().data().content() {
            BlockContent::Button(fields) => {
                assert_eq!(fields.buttons.len(), 2);
                assert_eq!(fields.buttons_per_row, 2);
                assert_eq!(fields.buttons[1].callback_data, "support");
            }
            other => panic!("expected button content, got {:?}", other),
        }
        assert_eq!(scenario.block("4").unwrap().exit_handles(), vec!["0", "1"]);
    }
}

#[cfg(test)]
mod import_export_tests {
    use super::*;

    fn bundle() -> Value {
        json!({
            "bot_id": "shop_bot",
            "scenario": serde_json::from_str::<Value>(SAMPLE_SCENARIO_JSON).unwrap(),
            "token": "123:ABC",
        })
    }

    #[test]
    fn test_import_missing_token_makes_no_backend_call() {
        let backend = MockBackend::new();
        let mut upload = bundle();
        upload.as_object_mut().unwrap().remove("token");

        let err = block_on(adapter(&backend).import_scenario(upload)).unwrap_err();
        assert_eq!(
            err,
            PersistenceError::Validation(ValidationError::MissingImportKey("token"))
        );
        assert!(err.user_message().contains("token"));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_import_rejects_each_missing_key() {
        for key in IMPORT_KEYS {
            let mut upload = bundle();
            upload.as_object_mut().unwrap().remove(key);
            let err = ExportBundle::from_value(upload).unwrap_err();
            assert_eq!(err, ValidationError::MissingImportKey(key));
        }
    }

    #[test]
    fn test_import_rejects_malformed_documents() {
        let err = ExportBundle::from_json("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, ValidationError::MalformedImport(_)));

        let err = ExportBundle::from_json("not json").unwrap_err();
        assert!(matches!(err, ValidationError::MalformedImport(_)));

        let mut upload = bundle();
        upload["scenario"] = json!("just text");
        assert!(matches!(
            ExportBundle::from_value(upload),
            Err(ValidationError::MalformedImport(_))
        ));

        let mut upload = bundle();
        upload["token"] = json!("   ");
        assert_eq!(
            ExportBundle::from_value(upload),
            Err(ValidationError::EmptyField("token"))
        );
    }

    #[test]
    fn test_import_sends_scenario_then_token() {
        let backend = MockBackend::new();
        let receipt = block_on(adapter(&backend).import_scenario(bundle())).unwrap();

        assert_eq!(receipt.bot_id, "shop_bot");
        assert_eq!(receipt.message.as_deref(), Some("Bot imported"));
        assert_eq!(backend.calls(), vec!["import_bot", "save_token"]);
        assert_eq!(backend.token_of("shop_bot").as_deref(), Some("123:ABC"));
        assert_eq!(backend.stored("shop_bot"), Some(sample_document()));
    }

    #[test]
    fn test_export_bundle_carries_token() {
        let backend =
            MockBackend::with_scenario("shop_bot", sample_document()).with_token("shop_bot", "T0K");
        let bundle = block_on(adapter(&backend).export_scenario("shop_bot")).unwrap();
        assert_eq!(bundle.bot_id, "shop_bot");
        assert_eq!(bundle.token, "T0K");
        assert_eq!(bundle.scenario, sample_document());

        // An exported bundle imports as-is.
        let json = serde_json::to_string(&bundle).unwrap();
        assert_eq!(ExportBundle::from_json(&json), Ok(bundle));
    }

    #[test]
    fn test_export_archive() {
        let backend = MockBackend::new();
        let bytes = block_on(adapter(&backend).export_archive("shop_bot")).unwrap();
        assert_eq!(bytes, b"PK-shop_bot".to_vec());
    }
}

#[cfg(test)]
mod adapter_tests {
    use super::*;

    #[test]
    fn test_save_then_load_round_trip() {
        let backend = MockBackend::new();
        let adapter = adapter(&backend);
        let scenario = sample_scenario("sample_bot");

        let ack = block_on(adapter.save(&scenario)).unwrap();
        assert_eq!(ack.message.as_deref(), Some("Scenario saved"));
        let loaded = block_on(adapter.load("sample_bot")).unwrap();
        assert_eq!(loaded, scenario);
    }

    #[test]
    fn test_empty_bot_id_is_rejected_before_any_call() {
        let backend = MockBackend::new();
        let adapter = adapter(&backend);

        let err = block_on(adapter.load("  ")).unwrap_err();
        assert_eq!(err, PersistenceError::Validation(ValidationError::EmptyField("bot_id")));
        let err = block_on(adapter.save(&Scenario::template(""))).unwrap_err();
        assert_eq!(err, PersistenceError::Validation(ValidationError::EmptyField("bot_id")));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_backend_message_is_reported() {
        let backend = MockBackend::new();
        let err = block_on(adapter(&backend).load("ghost")).unwrap_err();
        assert_eq!(err.user_message(), "Bot ghost not found");

        backend.fail_on("get_scenario", BackendError::Network("connection refused".to_string()));
        let err = block_on(adapter(&backend).load("ghost")).unwrap_err();
        assert_eq!(
            err.user_message(),
            "Network error. Please check your connection and try again."
        );
    }

    #[test]
    fn test_create_bot_seeds_template() {
        let backend = MockBackend::new();
        let scenario = block_on(adapter(&backend).create_bot("new_bot", "42:XYZ")).unwrap();

        assert_eq!(scenario, Scenario::template("new_bot"));
        assert_eq!(backend.calls(), vec!["create_bot", "save_token", "save_scenario"]);
        assert_eq!(backend.token_of("new_bot").as_deref(), Some("42:XYZ"));

        let stored = backend.stored("new_bot").unwrap();
        assert_eq!(stored.nodes.len(), 2);
        assert_eq!(stored.nodes[0].data["label"], json!("Welcome! The bot is running."));
    }

    #[test]
    fn test_create_bot_requires_name_and_token() {
        let backend = MockBackend::new();
        let err = block_on(adapter(&backend).create_bot("", "tok")).unwrap_err();
        assert_eq!(err, PersistenceError::Validation(ValidationError::EmptyField("bot_id")));
        let err = block_on(adapter(&backend).create_bot("bot", " ")).unwrap_err();
        assert_eq!(err, PersistenceError::Validation(ValidationError::EmptyField("token")));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_create_bot_stops_at_first_failure() {
        let backend = MockBackend::new();
        backend.fail_on(
            "create_bot",
            BackendError::Status {
                status: 400,
                message: Some("Bot already exists".to_string()),
            },
        );
        let err = block_on(adapter(&backend).create_bot("dup", "tok")).unwrap_err();
        assert_eq!(err.user_message(), "Bot already exists");
        assert_eq!(backend.calls(), vec!["create_bot"]);
    }

    #[test]
    fn test_rename_same_name_is_a_noop() {
        let backend = MockBackend::new().with_bots(&["alpha"]);
        let existing = backend.bots();
        let result = block_on(adapter(&backend).rename_scenario("alpha", " alpha ", &existing)).unwrap();
        assert_eq!(result, None);
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_rename_to_taken_name_is_rejected() {
        let backend = MockBackend::new().with_bots(&["alpha", "beta"]);
        let existing = backend.bots();
        let err = block_on(adapter(&backend).rename_scenario("alpha", "beta", &existing)).unwrap_err();
        assert_eq!(
            err,
            PersistenceError::Validation(ValidationError::DuplicateName("beta".to_string()))
        );
        let err = block_on(adapter(&backend).rename_scenario("alpha", "", &existing)).unwrap_err();
        assert_eq!(err, PersistenceError::Validation(ValidationError::EmptyField("new_name")));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_rename() {
        let backend = MockBackend::with_scenario("alpha", sample_document());
        let existing = backend.bots();
        let ack = block_on(adapter(&backend).rename_scenario("alpha", "gamma", &existing))
            .unwrap()
            .unwrap();
        assert_eq!(ack.message.as_deref(), Some("Bot renamed"));
        assert_eq!(backend.bots(), vec!["gamma"]);
    }

    #[test]
    fn test_delete_removes_bot_and_token() {
        let backend =
            MockBackend::with_scenario("alpha", sample_document()).with_token("alpha", "tok");
        block_on(adapter(&backend).delete_scenario("alpha")).unwrap();
        assert_eq!(backend.calls(), vec!["delete_bot", "delete_token"]);
        assert!(backend.bots().is_empty());
        assert_eq!(backend.token_of("alpha"), None);
    }

    #[test]
    fn test_token_helpers() {
        let backend = MockBackend::new();
        let adapter = adapter(&backend);
        assert_eq!(block_on(adapter.token("bot")).unwrap(), None);
        block_on(adapter.save_token("bot", "abc")).unwrap();
        assert_eq!(block_on(adapter.token("bot")).unwrap().as_deref(), Some("abc"));
        assert!(block_on(adapter.save_token("bot", "")).is_err());
    }
}

#[cfg(test)]
mod draft_tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_draft_save_load_discard() {
        let dir = tempdir().unwrap();
        let store = DraftStore::open(dir.path().join("drafts")).unwrap();
        let document = sample_document();
        let draft = Draft::new("shop/bot", Some("tok".to_string()), &document).unwrap();

        let path = store.save(&draft).unwrap();
        assert!(path.starts_with(store.dir()));
        assert_eq!(path.file_name().unwrap(), "shop%2Fbot.draft");

        let loaded = store.load("shop/bot").unwrap().unwrap();
        assert_eq!(loaded, draft);
        assert_eq!(loaded.document().unwrap(), document);
        assert_eq!(store.list().unwrap(), vec!["shop/bot"]);

        assert!(store.discard("shop/bot").unwrap());
        assert!(!store.discard("shop/bot").unwrap());
        assert!(store.load("shop/bot").unwrap().is_none());
    }

    #[test]
    fn test_draft_list_skips_foreign_files() {
        let dir = tempdir().unwrap();
        let store = DraftStore::open(dir.path()).unwrap();
        let document = ScenarioDocument::from_scenario(&Scenario::template("b"));
        store.save(&Draft::new("b", None, &document).unwrap()).unwrap();
        store.save(&Draft::new("a", None, &document).unwrap()).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        std::fs::write(dir.path().join("broken.draft"), [0xff, 0x00, 0x13]).unwrap();

        assert_eq!(store.list().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_similar_bot_ids_keep_separate_drafts() {
        let dir = tempdir().unwrap();
        let store = DraftStore::open(dir.path()).unwrap();
        let document = ScenarioDocument::from_scenario(&Scenario::template("x"));
        let ids = ["shop_bot", "shop/bot", "мой", "бот", "shop%2Fbot"];
        for (i, id) in ids.iter().enumerate() {
            let draft = Draft::new(*id, Some(format!("tok{}", i)), &document).unwrap();
            store.save(&draft).unwrap();
        }

        for (i, id) in ids.iter().enumerate() {
            let loaded = store.load(id).unwrap().unwrap();
            assert_eq!(loaded.bot_id, *id);
            assert_eq!(loaded.token, Some(format!("tok{}", i)));
        }
        let mut expected: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        expected.sort();
        assert_eq!(store.list().unwrap(), expected);

        assert!(store.discard("shop/bot").unwrap());
        assert!(store.load("shop_bot").unwrap().is_some());
    }

    #[test]
    fn test_draft_of_another_bot_is_rejected() {
        let dir = tempdir().unwrap();
        let store = DraftStore::open(dir.path()).unwrap();
        let document = ScenarioDocument::from_scenario(&Scenario::template("x"));
        let path = store
            .save(&Draft::new("shop_bot", Some("tokB".to_string()), &document).unwrap())
            .unwrap();
        // A file copied in under another bot's name.
        std::fs::copy(&path, dir.path().join("other.draft")).unwrap();

        let err = store.load("other").unwrap_err();
        assert!(matches!(
            err,
            botflow::error::DraftError::BotMismatch { ref expected, ref found }
                if expected == "other" && found == "shop_bot"
        ));
        assert!(store.discard("other").is_err());
        assert!(dir.path().join("other.draft").exists());
    }

    #[test]
    fn test_corrupt_draft_is_a_codec_error() {
        let err = Draft::from_bytes(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, botflow::error::DraftError::Codec(_)));
    }
}
