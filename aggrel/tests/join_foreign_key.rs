//! Foreign-key joins: the related records point back at the request.

mod support;

use aggrel::{Client, MemoryStore, PipelineError, Record, RelationshipError, prop};
use serde::{Deserialize, Serialize};
use support::{RequestDetail, User};

const REQUESTS: usize = 9;

#[derive(Record, Serialize, Deserialize, Debug, Clone)]
#[aggrel(collection = "requests")]
struct Request {
    #[aggrel(id)]
    #[serde(rename = "_id")]
    id: String,
    name: String,
}

#[derive(Record, Serialize, Deserialize, Debug, Clone)]
#[aggrel(collection = "requests")]
struct RequestJoined {
    #[aggrel(id)]
    #[serde(rename = "_id")]
    id: String,
    name: String,
    #[aggrel(foreign_key = "requestId")]
    user: Option<User>,
    #[aggrel(foreign_key = "requestId")]
    #[serde(default)]
    details: Vec<RequestDetail>,
}

fn seeded(label: &str) -> Client<MemoryStore> {
    let client = support::client(label);

    let requests: Vec<Request> = (0..REQUESTS)
        .map(|n| Request {
            id: format!("q{n}"),
            name: format!("request {n}"),
        })
        .collect();
    client.collection::<Request>().unwrap().insert_many(&requests).unwrap();

    // One owner for the even requests, plus owners of requests that do not exist.
    let users: Vec<User> = (0..REQUESTS)
        .filter(|n| n % 2 == 0)
        .map(|n| format!("q{n}"))
        .chain(["fake1".to_string(), "fake2".to_string()])
        .enumerate()
        .map(|(n, request_id)| User {
            id: format!("u{n}"),
            login: format!("login{n}"),
            request_id: Some(request_id),
        })
        .collect();
    client.collection::<User>().unwrap().insert_many(&users).unwrap();

    // n details for request qn, and a few pointing nowhere.
    let mut details = Vec::new();
    for n in 0..REQUESTS {
        for k in 0..n {
            details.push(RequestDetail {
                id: format!("d{n}_{k}"),
                request_id: Some(format!("q{n}")),
                note: String::new(),
            });
        }
    }
    for k in 0..3 {
        details.push(RequestDetail {
            id: format!("orphan{k}"),
            request_id: Some(format!("fake{k}")),
            note: String::new(),
        });
    }
    client.collection::<RequestDetail>().unwrap().insert_many(&details).unwrap();

    client
}

// ============ Tests ============

#[test]
fn related_records_point_back_at_the_request() {
    let client = seeded("foreign_key_join");
    let requests = client.collection::<Request>().unwrap();

    let picked: Vec<String> = requests
        .find_all()
        .limit((REQUESTS * 2 / 3) as u64)
        .to_list()
        .unwrap()
        .into_iter()
        .map(|request| request.id)
        .collect();

    let joined = requests
        .aggregate()
        .match_keys(picked.clone())
        .unwrap()
        .join(&[prop!(RequestJoined, user), prop!(RequestJoined, details)])
        .unwrap()
        .as_view::<RequestJoined>()
        .to_list()
        .unwrap();

    let ids: Vec<_> = joined.iter().map(|request| request.id.clone()).collect();
    assert_eq!(ids, picked, "one row per request when each has at most one user");

    for (n, request) in joined.iter().enumerate() {
        match &request.user {
            Some(user) => assert_eq!(user.request_id.as_deref(), Some(request.id.as_str())),
            None => assert!(n % 2 == 1, "{} should have an owner", request.id),
        }
        assert_eq!(request.details.len(), n);
        assert!(
            request
                .details
                .iter()
                .all(|detail| detail.request_id.as_deref() == Some(request.id.as_str()))
        );
    }
}

#[tokio::test]
async fn several_matches_on_a_single_property_yield_a_row_each() {
    let client = seeded("foreign_key_fanout");
    client
        .collection::<User>()
        .unwrap()
        .insert_many_async(&[User {
            id: "second-owner".into(),
            login: "second".into(),
            request_id: Some("q0".into()),
        }])
        .await
        .unwrap();

    let joined = client
        .collection::<Request>()
        .unwrap()
        .aggregate()
        .match_keys(["q0"])
        .unwrap()
        .join(&[prop!(RequestJoined, user)])
        .unwrap()
        .as_view::<RequestJoined>()
        .to_list_async()
        .await
        .unwrap();

    let mut owners: Vec<_> = joined
        .iter()
        .filter_map(|request| request.user.as_ref().map(|user| user.id.as_str()))
        .collect();
    owners.sort_unstable();
    assert_eq!(owners, ["second-owner", "u0"]);
}

#[test]
fn explain_looks_up_by_source_key() {
    let client = seeded("foreign_key_explain");
    let stages = client
        .collection::<Request>()
        .unwrap()
        .aggregate()
        .join(&[prop!(RequestJoined, details)])
        .unwrap()
        .explain();

    assert_eq!(stages.len(), 1, "collections are not unwound");
    assert_eq!(stages[0]["$lookup"]["from"], "request_details");
    assert_eq!(stages[0]["$lookup"]["localField"], "_id");
    assert_eq!(stages[0]["$lookup"]["foreignField"], "requestId");
    assert_eq!(stages[0]["$lookup"]["as"], "details");
}

#[test]
fn nested_reference_is_rejected() {
    let client = seeded("foreign_key_invalid");
    let err = client
        .collection::<Request>()
        .unwrap()
        .aggregate()
        .join(&[prop!(RequestJoined, user.login)])
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Relationship(RelationshipError::UnsupportedReferenceShape { ref reference })
            if reference.contains("login")
    ));
}

#[test]
fn undeclared_property_is_unresolved() {
    let client = seeded("foreign_key_unresolved");
    let err = client
        .collection::<Request>()
        .unwrap()
        .aggregate()
        .join(&[prop!(RequestJoined, name)])
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Relationship(RelationshipError::UnresolvedRelationship { .. })
    ));
}
