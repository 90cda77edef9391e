//! The same relationship declared from either side attaches the same records.

mod support;

use std::collections::{BTreeMap, BTreeSet};

use aggrel::{Record, prop};
use serde::{Deserialize, Serialize};
use support::RequestDetail;

#[derive(Record, Serialize, Deserialize, Debug, Clone)]
#[aggrel(collection = "orders")]
struct Order {
    #[aggrel(id)]
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "detailIds")]
    detail_ids: Vec<String>,
}

/// Reads the ids the order holds.
#[derive(Record, Serialize, Deserialize, Debug, Clone)]
#[aggrel(collection = "orders")]
struct ByLocalKey {
    #[aggrel(id)]
    #[serde(rename = "_id")]
    id: String,
    #[aggrel(local_key = "detailIds")]
    #[serde(default)]
    details: Vec<RequestDetail>,
}

/// Reads the back-references the details hold.
#[derive(Record, Serialize, Deserialize, Debug, Clone)]
#[aggrel(collection = "orders")]
struct ByForeignKey {
    #[aggrel(id)]
    #[serde(rename = "_id")]
    id: String,
    #[aggrel(foreign_key = "requestId")]
    #[serde(default)]
    details: Vec<RequestDetail>,
}

fn detail_sets<'a>(rows: impl Iterator<Item = (&'a String, &'a Vec<RequestDetail>)>) -> BTreeMap<String, BTreeSet<String>> {
    rows.map(|(id, details)| (id.clone(), details.iter().map(|detail| detail.id.clone()).collect()))
        .collect()
}

#[tokio::test]
async fn local_and_foreign_declarations_agree() {
    let client = support::client("join_symmetry");

    let mut orders = Vec::new();
    let mut details = Vec::new();
    for n in 0..6 {
        let order_id = format!("o{n}");
        let ids: Vec<String> = (0..n).map(|k| format!("o{n}_d{k}")).collect();
        details.extend(ids.iter().map(|id| RequestDetail {
            id: id.clone(),
            request_id: Some(order_id.clone()),
            note: String::new(),
        }));
        orders.push(Order {
            id: order_id,
            detail_ids: ids,
        });
    }
    client.collection::<Order>().unwrap().insert_many_async(&orders).await.unwrap();
    client
        .collection::<RequestDetail>()
        .unwrap()
        .insert_many_async(&details)
        .await
        .unwrap();

    let base = client.collection::<Order>().unwrap().aggregate();
    let local = base
        .join(&[prop!(ByLocalKey, details)])
        .unwrap()
        .as_view::<ByLocalKey>()
        .to_list_async()
        .await
        .unwrap();
    let foreign = base
        .join(&[prop!(ByForeignKey, details)])
        .unwrap()
        .as_view::<ByForeignKey>()
        .to_list_async()
        .await
        .unwrap();

    let local = detail_sets(local.iter().map(|order| (&order.id, &order.details)));
    let foreign = detail_sets(foreign.iter().map(|order| (&order.id, &order.details)));
    assert_eq!(local.len(), 6);
    assert_eq!(local, foreign);
}
