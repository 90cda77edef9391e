//! Example 03: Joins
//!
//! A view type declares how its extra fields relate to other collections:
//! - `local_key` - this record holds the related id(s)
//! - `foreign_key` - the related records hold this record's id
//!
//! `Vec<_>` fields receive every match; `Option<_>` fields receive one, and
//! records without a match are kept with the field empty.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::support;
use crate::{Record, prop};

#[derive(Record, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[aggrel(collection = "example_users")]
struct User {
    #[aggrel(id)]
    #[serde(rename = "_id")]
    id: String,
    login: String,
}

#[derive(Record, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[aggrel(collection = "example_comments")]
struct Comment {
    #[aggrel(id)]
    #[serde(rename = "_id")]
    id: String,
    ticket_id: String,
    body: String,
}

/// Stored shape.
#[derive(Record, Serialize, Deserialize, Debug, Clone)]
#[aggrel(collection = "example_tickets")]
struct Ticket {
    #[aggrel(id)]
    #[serde(rename = "_id")]
    id: String,
    assignee_id: Option<String>,
    #[serde(default)]
    watcher_ids: Vec<String>,
}

/// Read shape: the stored fields plus everything joined onto them.
#[derive(Record, Serialize, Deserialize, Debug, Clone)]
#[aggrel(collection = "example_tickets")]
struct TicketView {
    #[aggrel(id)]
    #[serde(rename = "_id")]
    id: String,
    assignee_id: Option<String>,
    #[serde(default)]
    watcher_ids: Vec<String>,

    #[aggrel(local_key = "assignee_id")]
    assignee: Option<User>,
    #[aggrel(local_key = "watcher_ids")]
    #[serde(default)]
    watchers: Vec<User>,
    #[aggrel(foreign_key = "ticket_id")]
    #[serde(default)]
    comments: Vec<Comment>,
}

pub async fn run() -> Result<()> {
    let client = support::client("joins");

    let users: Vec<User> = (1..=3)
        .map(|n| User {
            id: format!("u{n}"),
            login: format!("user-{n}"),
        })
        .collect();
    client.collection::<User>()?.insert_many(&users)?;

    let tickets = client.collection::<Ticket>()?;
    tickets.insert_many(&[
        Ticket {
            id: "t1".into(),
            assignee_id: Some("u1".into()),
            watcher_ids: vec!["u2".into(), "u3".into()],
        },
        Ticket {
            id: "t2".into(),
            assignee_id: None,
            watcher_ids: Vec::new(),
        },
    ])?;

    client.collection::<Comment>()?.insert_many(&[
        Comment {
            id: "c1".into(),
            ticket_id: "t1".into(),
            body: "looking".into(),
        },
        Comment {
            id: "c2".into(),
            ticket_id: "t1".into(),
            body: "fixed".into(),
        },
        Comment {
            id: "c3".into(),
            ticket_id: "t404".into(),
            body: "orphan".into(),
        },
    ])?;

    let joined = tickets
        .aggregate()
        .join(&[
            prop!(TicketView, assignee),
            prop!(TicketView, watchers),
            prop!(TicketView, comments),
        ])?
        .as_view::<TicketView>()
        .to_list_async()
        .await?;

    assert_eq!(joined.len(), 2, "unmatched single joins keep the ticket");
    for ticket in &joined {
        match ticket.id.as_str() {
            "t1" => {
                assert_eq!(ticket.assignee.as_ref().map(|user| user.login.as_str()), Some("user-1"));
                assert_eq!(ticket.watchers.len(), 2);
                assert!(ticket.comments.iter().all(|comment| comment.ticket_id == ticket.id));
                assert_eq!(ticket.comments.len(), 2);
            }
            _ => {
                assert!(ticket.assignee.is_none());
                assert!(ticket.watchers.is_empty() && ticket.comments.is_empty());
            }
        }
    }

    // Anything but a direct field access is refused before execution.
    let refused = tickets.aggregate().join(&[prop!(TicketView, assignee.login)]);
    assert!(refused.is_err());

    Ok(())
}
