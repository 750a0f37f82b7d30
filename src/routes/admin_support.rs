//! Staff inbox endpoints. The unread set and conversation views are also
//! offered as server-sent event streams that re-emit on every change.

use crate::dto::support_dto::{ConversationResponse, SelectConversationResponse, UnreadSnapshot};
use crate::error::Result;
use crate::models::support_message::{timeline, SupportMessage};
use crate::models::user::InboxUser;
use crate::routes::form::read_form;
use crate::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use futures::Stream;

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<InboxUser>>> {
    Ok(Json(state.inbox.users().await?))
}

/// Re-seeds the unread set, as when the inbox screen is opened again.
pub async fn refresh_inbox(State(state): State<AppState>) -> Result<Json<Vec<InboxUser>>> {
    state.inbox.remount().await?;
    Ok(Json(state.inbox.users().await?))
}

pub async fn unread_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>> {
    let mut tracker = state.inbox.subscribe();
    let stream = async_stream::stream! {
        loop {
            let snapshot = UnreadSnapshot {
                user_ids: tracker.borrow_and_update().users(),
            };
            yield Event::default().event("unread").json_data(snapshot);
            if tracker.changed().await.is_err() {
                break;
            }
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub async fn select_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<SelectConversationResponse>> {
    let conversation = state.inbox.select(&user_id).await?;
    let messages = state.support.conversation(&user_id).await?;
    Ok(Json(SelectConversationResponse {
        has_unread_messages: state.inbox.is_unread(&user_id),
        read: conversation.read_report.clone().unwrap_or_default(),
        timeline: timeline(&messages),
        messages,
        user_id,
    }))
}

enum FeedUpdate {
    Conversation(Vec<SupportMessage>),
    Scroll(u64),
}

pub async fn conversation_stream(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>>> {
    let mut feed = state.support.watch_conversation(&user_id)?;
    let mut scroll = feed.scroll_ticks();
    let stream_user = user_id.clone();
    let stream = async_stream::stream! {
        loop {
            let update = tokio::select! {
                next = feed.changed() => match next {
                    Ok(messages) => FeedUpdate::Conversation(messages),
                    Err(_) => break,
                },
                tick = scroll.changed() => match tick {
                    Ok(()) => FeedUpdate::Scroll(*scroll.borrow_and_update()),
                    Err(_) => break,
                },
            };
            match update {
                FeedUpdate::Conversation(messages) => {
                    let body = ConversationResponse {
                        user_id: stream_user.clone(),
                        timeline: timeline(&messages),
                        messages,
                    };
                    yield Event::default().event("conversation").json_data(body);
                }
                FeedUpdate::Scroll(tick) => {
                    yield Ok(Event::default().event("scroll").data(tick.to_string()));
                }
            }
        }
    };
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

pub async fn send_reply(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let draft = read_form(multipart).await?.into_draft()?;
    let message = state.support.send_admin_reply(&user_id, draft).await?;
    Ok((StatusCode::CREATED, Json(message)))
}
