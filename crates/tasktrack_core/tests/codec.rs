use serde_json::{json, Value};
use tasktrack_core::codec::{decode, encode, CodecError, TYPE_TAG};
use tasktrack_core::model::todo::{
    Bug, Feature, Image, Severity, TaskItem, Todo, TodoHeader, TodoKind, ValidationError,
};
use tasktrack_core::model::user::User;

fn sample_items() -> Vec<Todo> {
    let owner = User::new("A");
    let task = TaskItem::new("Buy milk", owner.clone());
    let feature = Feature {
        header: TodoHeader::new("Dark mode", owner.clone()),
        description: "theme toggle".to_string(),
        component: "UI".to_string(),
        priority: 3,
        assigned_to: owner.clone(),
    };
    let bug = Bug {
        header: TodoHeader::new("Crash on start", owner.clone()),
        description: "null deref".to_string(),
        severity: Severity::Major,
        affected_version: "1.0.3".to_string(),
        affected_users: 40,
        assigned_to: User::new("B"),
        images: Vec::new(),
    }
    .with_image(Image::new("aW1hZ2Ux"))
    .with_image(Image::new("aW1hZ2Uy"));

    vec![task.into(), feature.into(), bug.into()]
}

fn task_json(title: &str) -> Value {
    json!({
        "$type": "TaskItem",
        "id": "6f1c8e0a-0f55-4a53-9d0c-2b5f3c8b7a11",
        "title": title,
        "created_date": 1_700_000_000_000_i64,
        "is_completed": false,
        "is_deleted": false,
        "created_by": { "id": "0b6e1d4e-8c8b-4f83-a1f0-6b1f0d8a2c33", "name": "A" },
        "parent": null,
        "due_date": null
    })
}

#[test]
fn decode_inverts_encode_for_every_variant() {
    let items = sample_items();

    let text = encode(&items).unwrap();
    let decoded = decode(&text).unwrap();

    assert_eq!(decoded, items);
    let Todo::Bug(bug) = &decoded[2] else {
        panic!("third element should be a bug");
    };
    let data: Vec<&str> = bug.images.iter().map(|image| image.data.as_str()).collect();
    assert_eq!(data, vec!["aW1hZ2Ux", "aW1hZ2Uy"]);
}

#[test]
fn encoded_elements_carry_type_tags_and_severity_names() {
    let text = encode(&sample_items()).unwrap();
    let value: Value = serde_json::from_str(&text).unwrap();
    let elements = value.as_array().unwrap();

    let tags: Vec<&str> = elements
        .iter()
        .map(|element| element[TYPE_TAG].as_str().unwrap())
        .collect();
    assert_eq!(tags, vec!["TaskItem", "Feature", "Bug"]);
    assert_eq!(elements[2]["severity"], json!("Major"));
    assert_eq!(elements[2]["assigned_to"]["name"], json!("B"));
    assert!(elements[2]["images"][0].get(TYPE_TAG).is_none());
}

#[test]
fn unknown_type_is_rejected_before_any_item_decodes() {
    let mut rogue = task_json("Exploit");
    rogue[TYPE_TAG] = json!("System.Diagnostics.Process");
    let payload = json!([task_json("Buy milk"), rogue]).to_string();

    match decode(&payload) {
        Err(CodecError::TypeRejected { index, declared }) => {
            assert_eq!(index, 1);
            assert_eq!(declared, "System.Diagnostics.Process");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn nested_value_types_are_not_valid_top_level_tags() {
    let mut element = task_json("Buy milk");
    element[TYPE_TAG] = json!("User");
    let payload = json!([element]).to_string();

    assert!(matches!(
        decode(&payload),
        Err(CodecError::TypeRejected { index: 0, .. })
    ));
}

#[test]
fn malformed_payloads_fail_to_parse() {
    assert!(matches!(
        decode("[{\"$type\": \"TaskItem\""),
        Err(CodecError::Parse { index: None, .. })
    ));
    assert!(matches!(
        decode(&task_json("single").to_string()),
        Err(CodecError::Parse { index: None, .. })
    ));

    let mut untagged = task_json("untagged");
    untagged.as_object_mut().unwrap().remove(TYPE_TAG);
    assert!(matches!(
        decode(&json!([untagged]).to_string()),
        Err(CodecError::Parse { index: Some(0), .. })
    ));

    let mut broken = task_json("broken");
    broken["created_date"] = json!("yesterday");
    assert!(matches!(
        decode(&json!([broken]).to_string()),
        Err(CodecError::Parse { index: Some(0), .. })
    ));
}

#[test]
fn decoded_items_are_validated() {
    let payload = json!([task_json("ok"), task_json("  ")]).to_string();

    match decode(&payload) {
        Err(CodecError::Invalid { index, source }) => {
            assert_eq!(index, 1);
            assert_eq!(source, ValidationError::EmptyTitle);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn empty_array_decodes_to_nothing() {
    assert!(decode("[]").unwrap().is_empty());
    assert_eq!(encode(&[]).unwrap().trim(), "[]");
}

#[test]
fn nested_users_are_validated_during_decode() {
    let mut nameless = task_json("second");
    nameless["created_by"]["name"] = json!("");
    let payload = json!([task_json("first"), nameless]).to_string();

    match decode(&payload) {
        Err(CodecError::Invalid { index, source }) => {
            assert_eq!(index, 1);
            assert_eq!(source, ValidationError::EmptyName);
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let mut nil_user = task_json("first");
    nil_user["created_by"]["id"] = json!("00000000-0000-0000-0000-000000000000");
    assert!(matches!(
        decode(&json!([nil_user]).to_string()),
        Err(CodecError::Invalid {
            index: 0,
            source: ValidationError::NilId
        })
    ));
}

#[test]
fn bug_assignee_and_image_ids_are_validated_during_decode() {
    let text = encode(&sample_items()).unwrap();
    let value: Value = serde_json::from_str(&text).unwrap();

    let mut unassigned = value.clone();
    unassigned[2]["assigned_to"]["name"] = json!("   ");
    assert!(matches!(
        decode(&unassigned.to_string()),
        Err(CodecError::Invalid {
            index: 2,
            source: ValidationError::EmptyName
        })
    ));

    let mut nil_image = value;
    nil_image[2]["images"][1]["id"] = json!("00000000-0000-0000-0000-000000000000");
    assert!(matches!(
        decode(&nil_image.to_string()),
        Err(CodecError::Invalid {
            index: 2,
            source: ValidationError::NilId
        })
    ));
}

#[test]
fn keys_of_other_variants_are_rejected() {
    let mut task = task_json("Buy milk");
    task["severity"] = json!("Critical");
    let payload = json!([task_json("first"), task]).to_string();

    match decode(&payload) {
        Err(CodecError::UnexpectedField { index, kind, field }) => {
            assert_eq!(index, 1);
            assert_eq!(kind, TodoKind::TaskItem);
            assert_eq!(field, "severity");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let text = encode(&sample_items()).unwrap();
    let mut value: Value = serde_json::from_str(&text).unwrap();
    value[1]["images"] = json!([]);
    assert!(matches!(
        decode(&value.to_string()),
        Err(CodecError::UnexpectedField { index: 1, kind: TodoKind::Feature, .. })
    ));
}
