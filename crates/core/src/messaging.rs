//! Messaging between portal accounts.
//!
//! Messages are append-only. A conversation is every message exchanged
//! between the same two emails; `reply_to_id` records which message was
//! quoted but does not form a tree.

use std::collections::HashMap;

use tracing::info;

use crate::access::{self, Caller};
use crate::config::MessagingConfig;
use crate::db::repository::PortalRepository;
use crate::error::{CompassError, Result};
use crate::models::common::{normalize_email, Role};
use crate::models::message::{ConversationSummary, Message, NewMessage};
use crate::staff;

/// The advisor email of whichever side of a student/advisor pair is the student.
async fn student_advisor<R>(repo: &R, sender: &Caller, receiver: &Caller) -> Result<Option<String>>
where
    R: PortalRepository + ?Sized,
{
    let student_email = match (sender.role, receiver.role) {
        (Role::Student, Role::Advisor) => &sender.email,
        (Role::Advisor, Role::Student) => &receiver.email,
        _ => return Ok(None),
    };
    Ok(repo
        .get_student_by_email(student_email)
        .await?
        .and_then(|s| s.advisor_email))
}

/// Send a message from the caller to `receiver_email`.
///
/// A reply to a message the receiver sent to the caller is always allowed,
/// so anyone who can write to an account can also be answered.
pub async fn send_message<R>(
    repo: &R,
    config: &MessagingConfig,
    caller: &Caller,
    receiver_email: &str,
    content: &str,
    reply_to_id: Option<i64>,
) -> Result<Message>
where
    R: PortalRepository + ?Sized,
{
    let content = content.trim();
    if content.is_empty() {
        return Err(CompassError::Validation("message content is required".into()));
    }
    if content.chars().count() > config.max_message_length {
        return Err(CompassError::Validation(format!(
            "message exceeds {} characters",
            config.max_message_length
        )));
    }

    let receiver_email = normalize_email(receiver_email);
    if receiver_email == caller.email {
        return Err(CompassError::Validation("cannot message yourself".into()));
    }
    let receiver_role = staff::resolve_role(repo, &receiver_email)
        .await?
        .ok_or_else(|| CompassError::NotFound(format!("recipient {receiver_email}")))?;
    let receiver = Caller::new(receiver_role, &receiver_email);

    let quoted = match reply_to_id {
        Some(id) => {
            let original = repo
                .get_message(id)
                .await?
                .filter(|m| m.involves(&caller.email) && m.involves(&receiver.email))
                .ok_or_else(|| {
                    CompassError::Validation(format!(
                        "message {id} is not part of this conversation"
                    ))
                })?;
            Some(original)
        }
        None => None,
    };

    let answering = quoted
        .as_ref()
        .is_some_and(|m| m.sender_email == receiver.email && m.receiver_email == caller.email);
    if !answering {
        let link = student_advisor(repo, caller, &receiver).await?;
        if !access::can_message(caller, &receiver, link.as_deref()) {
            return Err(CompassError::Forbidden(format!(
                "{} may not message this {}",
                caller.role, receiver.role
            )));
        }
    }

    let message = repo
        .create_message(&NewMessage {
            sender_email: caller.email.clone(),
            sender_role: caller.role,
            receiver_email: receiver.email,
            receiver_role: receiver.role,
            content: content.to_string(),
            reply_to_id,
        })
        .await?;
    info!(
        id = message.id,
        from = %message.sender_email,
        to = %message.receiver_email,
        "message sent"
    );
    Ok(message)
}

/// Group the caller's messages by counterpart, most recent conversation first.
pub fn summarize_conversations(email: &str, newest_first: &[Message]) -> Vec<ConversationSummary> {
    let mut summaries: Vec<ConversationSummary> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for message in newest_first {
        let (counterpart, role) = message.counterpart(email);
        let unread = (message.receiver_email == email && !message.is_read) as i64;
        match index.get(counterpart) {
            Some(&i) => {
                summaries[i].total += 1;
                summaries[i].unread += unread;
            }
            None => {
                index.insert(counterpart, summaries.len());
                summaries.push(ConversationSummary {
                    counterpart_email: counterpart.to_string(),
                    counterpart_role: role,
                    last_message: message.content.clone(),
                    last_message_at: message.created_at,
                    total: 1,
                    unread,
                });
            }
        }
    }
    summaries
}

pub async fn list_conversations<R>(repo: &R, caller: &Caller) -> Result<Vec<ConversationSummary>>
where
    R: PortalRepository + ?Sized,
{
    let messages = repo.list_messages_for(&caller.email).await?;
    Ok(summarize_conversations(&caller.email, &messages))
}

/// Messages between the caller and `other`, oldest first.
pub async fn conversation<R>(repo: &R, caller: &Caller, other: &str) -> Result<Vec<Message>>
where
    R: PortalRepository + ?Sized,
{
    repo.list_conversation(&caller.email, &normalize_email(other))
        .await
}

/// Mark one message read. Only its receiver may do so.
pub async fn mark_read<R>(repo: &R, caller: &Caller, id: i64) -> Result<Message>
where
    R: PortalRepository + ?Sized,
{
    let message = repo
        .get_message(id)
        .await?
        .filter(|m| m.involves(&caller.email))
        .ok_or_else(|| CompassError::NotFound(format!("message {id}")))?;
    if message.receiver_email != caller.email {
        return Err(CompassError::Forbidden(
            "only the receiver can mark a message read".into(),
        ));
    }
    if !message.is_read {
        repo.mark_message_read(id, &caller.email).await?;
    }
    Ok(Message {
        is_read: true,
        ..message
    })
}

/// Mark everything `other` sent to the caller as read. Returns how many changed.
pub async fn mark_conversation_read<R>(repo: &R, caller: &Caller, other: &str) -> Result<u64>
where
    R: PortalRepository + ?Sized,
{
    repo.mark_conversation_read(&caller.email, &normalize_email(other))
        .await
}

pub async fn unread_count<R>(repo: &R, caller: &Caller) -> Result<i64>
where
    R: PortalRepository + ?Sized,
{
    repo.count_unread(&caller.email).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{AdminRepository, AdvisorRepository, SalesRepository, StudentRepository};
    use crate::db::{sqlite::SqliteRepository, DatabasePool};
    use crate::models::advisor::NewAdvisor;
    use crate::models::staff::NewStaff;
    use crate::models::student::NewStudent;

    const STUDENT: &str = "lina@example.com";
    const OTHER_STUDENT: &str = "omar@example.com";
    const ADVISOR: &str = "sam@compass.example";
    const OTHER_ADVISOR: &str = "kim@compass.example";
    const ADMIN: &str = "root@compass.example";
    const SALES: &str = "lee@compass.example";

    async fn setup() -> SqliteRepository {
        let repo =
            SqliteRepository::new(DatabasePool::new_sqlite_memory().await.unwrap().into_sqlite());
        for email in [ADVISOR, OTHER_ADVISOR] {
            repo.create_advisor(&NewAdvisor {
                email: email.into(),
                name: "Advisor".into(),
                phone: None,
                password_hash: None,
            })
            .await
            .unwrap();
        }
        for email in [STUDENT, OTHER_STUDENT] {
            repo.create_student(&NewStudent::new(email, "S", "T"))
                .await
                .unwrap();
        }
        repo.assign_advisor(STUDENT, Some(ADVISOR)).await.unwrap();
        repo.upsert_admin(&NewStaff {
            email: ADMIN.into(),
            name: "Root".into(),
            password_hash: None,
        })
        .await
        .unwrap();
        repo.create_sales_user(&NewStaff {
            email: SALES.into(),
            name: "Lee".into(),
            password_hash: None,
        })
        .await
        .unwrap();
        repo
    }

    fn config() -> MessagingConfig {
        MessagingConfig {
            max_message_length: 20,
        }
    }

    fn who(role: Role, email: &str) -> Caller {
        Caller::new(role, email)
    }

    #[tokio::test]
    async fn student_messages_own_advisor_and_admin() {
        let repo = setup().await;
        let me = who(Role::Student, STUDENT);
        let sent = send_message(&repo, &config(), &me, ADVISOR, "  Hello  ", None)
            .await
            .unwrap();
        assert_eq!(sent.content, "Hello");
        assert_eq!(sent.receiver_role, Role::Advisor);
        assert!(send_message(&repo, &config(), &me, ADMIN, "Hi", None).await.is_ok());

        let err = send_message(&repo, &config(), &me, OTHER_ADVISOR, "Hi", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CompassError::Forbidden(_)));
        assert!(send_message(&repo, &config(), &me, OTHER_STUDENT, "Hi", None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn advisor_messages_only_own_students() {
        let repo = setup().await;
        let sam = who(Role::Advisor, ADVISOR);
        assert!(send_message(&repo, &config(), &sam, STUDENT, "Hi", None).await.is_ok());
        assert!(send_message(&repo, &config(), &sam, OTHER_STUDENT, "Hi", None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn sales_message_can_be_answered() {
        let repo = setup().await;
        let sales = who(Role::Sales, SALES);
        let first = send_message(&repo, &config(), &sales, STUDENT, "Offer", None)
            .await
            .unwrap();

        let me = who(Role::Student, STUDENT);
        assert!(send_message(&repo, &config(), &me, SALES, "Thanks", None)
            .await
            .is_err());
        let reply = send_message(&repo, &config(), &me, SALES, "Thanks", Some(first.id))
            .await
            .unwrap();
        assert_eq!(reply.reply_to_id, Some(first.id));
    }

    #[tokio::test]
    async fn reply_must_belong_to_conversation() {
        let repo = setup().await;
        let admin = who(Role::Admin, ADMIN);
        let other = send_message(&repo, &config(), &admin, OTHER_STUDENT, "Hi", None)
            .await
            .unwrap();
        let me = who(Role::Student, STUDENT);
        let err = send_message(&repo, &config(), &me, ADMIN, "Re", Some(other.id))
            .await
            .unwrap_err();
        assert!(matches!(err, CompassError::Validation(_)));
    }

    #[tokio::test]
    async fn content_rules() {
        let repo = setup().await;
        let me = who(Role::Student, STUDENT);
        for bad in ["", "   ", "this message is far too long"] {
            let err = send_message(&repo, &config(), &me, ADVISOR, bad, None)
                .await
                .unwrap_err();
            assert!(matches!(err, CompassError::Validation(_)), "{bad:?}");
        }
        assert!(send_message(&repo, &config(), &me, STUDENT, "Me", None).await.is_err());
        let err = send_message(&repo, &config(), &me, "ghost@x.io", "Hi", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CompassError::NotFound(_)));
    }

    #[tokio::test]
    async fn conversations_group_by_counterpart() {
        let repo = setup().await;
        let me = who(Role::Student, STUDENT);
        let sam = who(Role::Advisor, ADVISOR);
        let admin = who(Role::Admin, ADMIN);

        send_message(&repo, &config(), &me, ADVISOR, "one", None).await.unwrap();
        send_message(&repo, &config(), &sam, STUDENT, "two", None).await.unwrap();
        send_message(&repo, &config(), &admin, STUDENT, "three", None).await.unwrap();
        send_message(&repo, &config(), &sam, STUDENT, "four", None).await.unwrap();

        let convos = list_conversations(&repo, &me).await.unwrap();
        assert_eq!(convos.len(), 2);
        assert_eq!(convos[0].counterpart_email, ADVISOR);
        assert_eq!(convos[0].last_message, "four");
        assert_eq!(convos[0].total, 3);
        assert_eq!(convos[0].unread, 2);
        assert_eq!(convos[1].counterpart_role, Role::Admin);
        assert_eq!(convos[1].unread, 1);

        let thread = conversation(&repo, &me, ADVISOR).await.unwrap();
        let contents: Vec<_> = thread.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["one", "two", "four"]);
    }

    #[tokio::test]
    async fn read_state() {
        let repo = setup().await;
        let me = who(Role::Student, STUDENT);
        let sam = who(Role::Advisor, ADVISOR);
        let msg = send_message(&repo, &config(), &sam, STUDENT, "a", None).await.unwrap();
        send_message(&repo, &config(), &sam, STUDENT, "b", None).await.unwrap();
        assert_eq!(unread_count(&repo, &me).await.unwrap(), 2);

        let err = mark_read(&repo, &sam, msg.id).await.unwrap_err();
        assert!(matches!(err, CompassError::Forbidden(_)));
        let outsider = who(Role::Student, OTHER_STUDENT);
        let err = mark_read(&repo, &outsider, msg.id).await.unwrap_err();
        assert!(matches!(err, CompassError::NotFound(_)));

        assert!(mark_read(&repo, &me, msg.id).await.unwrap().is_read);
        assert_eq!(unread_count(&repo, &me).await.unwrap(), 1);
        assert_eq!(mark_conversation_read(&repo, &me, ADVISOR).await.unwrap(), 1);
        assert_eq!(unread_count(&repo, &me).await.unwrap(), 0);
    }
}
