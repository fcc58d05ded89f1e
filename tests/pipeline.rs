use std::path::Path;
use std::sync::Arc;

use notion_source::client::{MockNotionClient, TransportError};
use notion_source::config::{DatabaseResource, Limit, SourceConfig};
use notion_source::melt::{FlattenConfig, StreamWriter, TableWriter};
use notion_source::model::{Database, Page};
use notion_source::source::{NotionSource, USERS_STREAM};
use notion_source::SourceError;
use serde_json::{json, Value};

fn person(id: &str, name: &str) -> Value {
    json!({
        "object": "user",
        "id": id,
        "type": "person",
        "name": name,
        "avatar_url": null,
        "person": {"email": format!("{}@example.com", id)}
    })
}

fn bot(id: &str) -> Value {
    json!({
        "object": "user",
        "id": id,
        "type": "bot",
        "name": "Importer",
        "bot": {"owner": {"type": "workspace", "workspace": true}}
    })
}

fn schema_entry(name: &str, kind: &str) -> Value {
    json!({"id": name, "name": name, "type": kind, kind: {}})
}

fn tasks_database() -> Database {
    serde_json::from_value(json!({
        "object": "database",
        "id": "db-tasks",
        "title": [{"type": "text", "text": {"content": "Tasks"}, "plain_text": "Tasks"}],
        "properties": {
            "Name": schema_entry("Name", "title"),
            "Status": schema_entry("Status", "select"),
            "Tags": schema_entry("Tags", "multi_select")
        }
    }))
    .unwrap()
}

fn task(id: &str, words: &[&str], status: Option<&str>, tags: &[&str]) -> Page {
    let title: Vec<Value> = words
        .iter()
        .map(|word| json!({"type": "text", "text": {"content": word}, "plain_text": word}))
        .collect();
    let tags: Vec<Value> = tags
        .iter()
        .map(|tag| json!({"id": tag, "name": tag, "color": "default"}))
        .collect();

    serde_json::from_value(json!({
        "object": "page",
        "id": id,
        "properties": {
            "Name": {"id": "title", "type": "title", "title": title},
            "Status": {"id": "s", "type": "select", "select": status.map(|id| json!({"id": id, "name": id}))},
            "Tags": {"id": "t", "type": "multi_select", "multi_select": tags},
            "Formula": {"id": "f", "type": "formula", "formula": {"type": "number", "number": 1}}
        }
    }))
    .unwrap()
}

fn workspace() -> MockNotionClient {
    MockNotionClient::new()
        .with_users(vec![
            vec![person("u1", "Ada"), bot("b1")],
            vec![person("u2", "Grace")],
        ])
        .with_database(
            tasks_database(),
            vec![
                vec![task("page-1", &["Hello", "World"], Some("opt_1"), &["id_a", "id_b"])],
                vec![task("page-2", &["Second"], None, &[])],
            ],
        )
}

fn read_rows(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_full_extraction_to_tables() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(workspace());
    let config = SourceConfig::default().with_database(DatabaseResource::new("db-tasks"));
    let mut writer = TableWriter::new(dir.path(), FlattenConfig::default()).unwrap();

    let summary = NotionSource::new(client, config).run(&mut writer).await.unwrap();

    assert_eq!(summary.stream(USERS_STREAM).unwrap().records, 3);
    assert_eq!(summary.stream("db-tasks").unwrap().records, 2);
    assert_eq!(summary.failed().count(), 0);

    let persons = read_rows(&dir.path().join("persons.jsonl"));
    assert_eq!(
        persons,
        vec![
            json!({"id": "u1", "name": "Ada", "avatar_url": null, "person__email": "u1@example.com", "_load_id": "u1"}),
            json!({"id": "u2", "name": "Grace", "avatar_url": null, "person__email": "u2@example.com", "_load_id": "u2"}),
        ]
    );

    let bots = read_rows(&dir.path().join("bots.jsonl"));
    assert_eq!(
        bots,
        vec![json!({
            "id": "b1",
            "name": "Importer",
            "bot__owner__type": "workspace",
            "bot__owner__workspace": true,
            "_load_id": "b1"
        })]
    );

    let tasks = read_rows(&dir.path().join("tasks.jsonl"));
    assert_eq!(
        tasks,
        vec![
            json!({"name": "Hello World", "status": "opt_1", "tags": ["id_a", "id_b"], "id": "page-1", "_load_id": "page-1"}),
            json!({"name": "Second", "status": null, "tags": [], "id": "page-2", "_load_id": "page-2"}),
        ]
    );
}

#[tokio::test]
async fn test_rerun_keeps_one_row_per_id() {
    let dir = tempfile::tempdir().unwrap();

    for _ in 0..2 {
        let client = Arc::new(workspace());
        let config = SourceConfig::default().with_database(DatabaseResource::new("db-tasks"));
        let mut writer = TableWriter::new(dir.path(), FlattenConfig::default()).unwrap();
        NotionSource::new(client, config).run(&mut writer).await.unwrap();
    }

    assert_eq!(read_rows(&dir.path().join("persons.jsonl")).len(), 2);
    assert_eq!(read_rows(&dir.path().join("bots.jsonl")).len(), 1);
    assert_eq!(read_rows(&dir.path().join("tasks.jsonl")).len(), 2);

    // A renamed user replaces its previous row.
    let renamed = vec![vec![person("u1", "Ada Lovelace")]];
    let client = Arc::new(MockNotionClient::new().with_users(renamed));
    let mut writer = TableWriter::new(dir.path(), FlattenConfig::default()).unwrap();
    NotionSource::new(client, SourceConfig::default())
        .run(&mut writer)
        .await
        .unwrap();

    let persons = read_rows(&dir.path().join("persons.jsonl"));
    assert_eq!(persons.len(), 2);
    assert_eq!(persons[0]["name"], json!("Ada Lovelace"));
    assert_eq!(persons[1]["name"], json!("Grace"));
}

#[tokio::test]
async fn test_collision_fails_before_any_row_is_requested() {
    let database: Database = serde_json::from_value(json!({
        "id": "db-dates",
        "title": [],
        "properties": {
            "Due Date": schema_entry("Due Date", "date"),
            "due-date": schema_entry("due-date", "date")
        }
    }))
    .unwrap();
    let client = Arc::new(MockNotionClient::new().with_database(database, vec![vec![]]));
    let config = SourceConfig {
        include_users: false,
        ..SourceConfig::default()
    }
    .with_database(DatabaseResource::new("db-dates"));
    let mut buffer = Vec::new();
    let mut writer = StreamWriter::new(&mut buffer, FlattenConfig::default());

    let err = NotionSource::new(client.clone(), config)
        .run(&mut writer)
        .await
        .unwrap_err();

    match err {
        SourceError::NamingCollision { column, properties } => {
            assert_eq!(column, "due_date");
            assert_eq!(properties, vec!["Due Date".to_string(), "due-date".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(client.requests(), vec!["retrieve_database db-dates -".to_string()]);
    assert!(buffer.is_empty());
}

#[tokio::test]
async fn test_abort_keeps_rows_loaded_before_the_failure() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(MockNotionClient::new().with_users(vec![
        vec![person("u1", "Ada")],
        vec![json!({"object": "user", "id": "g1", "type": "guest"})],
    ]));
    let mut writer = TableWriter::new(dir.path(), FlattenConfig::default()).unwrap();

    let err = NotionSource::new(client, SourceConfig::default())
        .run(&mut writer)
        .await
        .unwrap_err();

    assert!(matches!(err, SourceError::UnsupportedEntityType(tag) if tag == "guest"));
    let persons = read_rows(&dir.path().join("persons.jsonl"));
    assert_eq!(persons.len(), 1);
    assert_eq!(persons[0]["id"], json!("u1"));
}

#[tokio::test]
async fn test_failing_stream_aborts_by_default() {
    let client = Arc::new(workspace().with_failure(USERS_STREAM, 503));
    let config = SourceConfig::default().with_database(DatabaseResource::new("db-tasks"));
    let mut writer = StreamWriter::new(Vec::new(), FlattenConfig::default());

    let err = NotionSource::new(client, config)
        .run(&mut writer)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SourceError::Transport(TransportError::Api { status: 503, .. })
    ));
}

#[tokio::test]
async fn test_skip_failed_streams_keeps_the_others() {
    let client = Arc::new(workspace().with_failure(USERS_STREAM, 503));
    let config = SourceConfig {
        skip_failed_streams: true,
        ..SourceConfig::default()
    }
    .with_database(DatabaseResource::new("db-tasks"));
    let mut writer = StreamWriter::new(Vec::new(), FlattenConfig::default());

    let summary = NotionSource::new(client, config).run(&mut writer).await.unwrap();

    let users = summary.stream(USERS_STREAM).unwrap();
    assert!(users.error.as_deref().unwrap().contains("503"));
    assert_eq!(users.records, 0);
    assert_eq!(summary.stream("db-tasks").unwrap().records, 2);

    let output = String::from_utf8(writer.into_inner()).unwrap();
    let tables: Vec<String> = output
        .lines()
        .map(|line| {
            let row: Value = serde_json::from_str(line).unwrap();
            row["_table"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(tables, vec!["tasks", "tasks"]);
}

#[tokio::test]
async fn test_users_limit_across_pages() {
    let client = Arc::new(workspace());
    let config = SourceConfig {
        users_limit: Limit::from_signed(2),
        ..SourceConfig::default()
    };
    let mut writer = StreamWriter::new(Vec::new(), FlattenConfig::default());

    let summary = NotionSource::new(client.clone(), config).run(&mut writer).await.unwrap();

    assert_eq!(summary.total_records(), 2);
    assert_eq!(client.requests(), vec!["list_users users -".to_string()]);
}

#[tokio::test]
async fn test_configured_table_name_and_projection() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(workspace());
    let resource = DatabaseResource::new("db-tasks")
        .with_table_name("my_tasks")
        .with_include(|property| property.kind != "multi_select")
        .with_column_projection(|property, normalize| match property.name.as_str() {
            "Name" => Some("title".to_string()),
            _ => Some(normalize(property.name.as_str())),
        });
    let config = SourceConfig {
        include_users: false,
        ..SourceConfig::default()
    }
    .with_database(resource);
    let mut writer = TableWriter::new(dir.path(), FlattenConfig::default()).unwrap();

    NotionSource::new(client, config).run(&mut writer).await.unwrap();

    let rows = read_rows(&dir.path().join("my_tasks.jsonl"));
    assert_eq!(
        rows[0],
        json!({"title": "Hello World", "status": "opt_1", "id": "page-1", "_load_id": "page-1"})
    );
    assert!(!dir.path().join("tasks.jsonl").exists());
}
