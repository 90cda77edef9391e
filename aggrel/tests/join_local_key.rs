//! Local-key joins: the request holds the related ids.

mod support;

use aggrel::{Client, MemoryStore, PipelineError, Record, RelationshipError, prop};
use serde::{Deserialize, Serialize};
use support::{RequestDetail, User};

const REQUESTS: usize = 12;

#[derive(Record, Serialize, Deserialize, Debug, Clone)]
#[aggrel(collection = "requests")]
#[serde(rename_all = "camelCase")]
struct Request {
    #[aggrel(id)]
    #[serde(rename = "_id")]
    id: String,
    user_id: Option<String>,
    detail_ids: Vec<String>,
}

#[derive(Record, Serialize, Deserialize, Debug, Clone)]
#[aggrel(collection = "requests")]
#[serde(rename_all = "camelCase")]
struct RequestJoined {
    #[aggrel(id)]
    #[serde(rename = "_id")]
    id: String,
    user_id: Option<String>,
    detail_ids: Vec<String>,
    #[aggrel(local_key = "userId")]
    user: Option<User>,
    #[aggrel(local_key = "detailIds")]
    #[serde(default)]
    request_details: Vec<RequestDetail>,
}

fn seeded(label: &str) -> Client<MemoryStore> {
    let client = support::client(label);

    let users: Vec<User> = (0..30)
        .map(|n| User {
            id: format!("u{n}"),
            login: format!("login{n}"),
            request_id: None,
        })
        .collect();
    client.collection::<User>().unwrap().insert_many(&users).unwrap();

    let details: Vec<RequestDetail> = (0..60)
        .map(|n| RequestDetail {
            id: format!("d{n}"),
            request_id: None,
            note: format!("detail {n}"),
        })
        .collect();
    client.collection::<RequestDetail>().unwrap().insert_many(&details).unwrap();

    // Every third request has no user; every request also lists an id that does not exist.
    let requests: Vec<Request> = (0..REQUESTS)
        .map(|n| Request {
            id: format!("q{n}"),
            user_id: (n % 3 != 0).then(|| format!("u{}", (n * 7) % 30)),
            detail_ids: vec![
                format!("d{}", n * 4),
                format!("d{}", n * 4 + 1),
                format!("fake{n}"),
                format!("d{}", n * 4 + 2),
            ],
        })
        .collect();
    client.collection::<Request>().unwrap().insert_many(&requests).unwrap();

    client
}

// ============ Tests ============

#[test]
fn single_and_collection_properties_are_attached() {
    let client = seeded("local_key_join");
    let requests = client.collection::<Request>().unwrap();

    let picked: Vec<String> = requests
        .find_all()
        .limit((REQUESTS * 2 / 3) as u64)
        .to_list()
        .unwrap()
        .into_iter()
        .map(|request| request.id)
        .collect();
    assert_eq!(picked.len(), 8);

    let joined = requests
        .aggregate()
        .match_keys(picked.clone())
        .unwrap()
        .join(&[prop!(RequestJoined, user), prop!(RequestJoined, request_details)])
        .unwrap()
        .as_view::<RequestJoined>()
        .to_list()
        .unwrap();

    let mut ids: Vec<_> = joined.iter().map(|request| request.id.clone()).collect();
    ids.sort();
    let mut expected = picked;
    expected.sort();
    assert_eq!(ids, expected, "unmatched users keep their request");

    for request in &joined {
        match (&request.user, &request.user_id) {
            (Some(user), Some(user_id)) => assert_eq!(&user.id, user_id),
            (None, None) => {}
            other => panic!("user does not follow user_id on {}: {other:?}", request.id),
        }
        assert_eq!(request.request_details.len(), 3, "fake ids match nothing");
        assert!(
            request
                .request_details
                .iter()
                .all(|detail| request.detail_ids.contains(&detail.id))
        );
    }
}

#[tokio::test]
async fn join_then_filter_on_joined_field() {
    let client = seeded("local_key_filter");
    let joined = client
        .collection::<Request>()
        .unwrap()
        .aggregate()
        .join(&[prop!(RequestJoined, user)])
        .unwrap()
        .match_filter(serde_json::json!({"user.login": "login7"}))
        .as_view::<RequestJoined>()
        .to_list_async()
        .await
        .unwrap();

    assert_eq!(joined.len(), 1);
    assert_eq!(joined[0].id, "q1");
}

#[test]
fn explain_shows_lookup_and_unwind() {
    let client = seeded("local_key_explain");
    let stages = client
        .collection::<Request>()
        .unwrap()
        .aggregate()
        .join(&[prop!(RequestJoined, user)])
        .unwrap()
        .explain();

    assert_eq!(stages.len(), 2);
    assert_eq!(stages[0]["$lookup"]["from"], "users");
    assert_eq!(stages[0]["$lookup"]["localField"], "userId");
    assert_eq!(stages[0]["$lookup"]["foreignField"], "_id");
    assert_eq!(stages[1]["$unwind"]["preserveNullAndEmptyArrays"], true);
}

#[test]
fn nested_reference_is_rejected() {
    let client = seeded("local_key_invalid");
    let err = client
        .collection::<Request>()
        .unwrap()
        .aggregate()
        .join(&[prop!(RequestJoined, user), prop!(RequestJoined, user.login)])
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Relationship(RelationshipError::UnsupportedReferenceShape { .. })
    ));
}
