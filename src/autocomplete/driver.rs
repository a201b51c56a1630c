// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Event loop around [`SuggestionEngine`]
//!
//! Editor events arrive on a channel and the inactivity check runs on a
//! fixed interval. Provider requests run on their own task so events keep
//! flowing while a suggestion is being fetched. Hosts that need to know
//! whether a key was taken by the engine (Tab accepting a suggestion) pass a
//! [`KeyOutcome`] sender and skip their default action when `consumed` is set.

use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::engine::{SuggestionEngine, SuggestionReply};
use crate::editor::{EditorEvent, KeyInput};

/// Interval between inactivity checks
pub const DEFAULT_TICK: Duration = Duration::from_millis(50);

/// Reply for every [`EditorEvent::Key`] the loop handles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyOutcome {
    pub key: KeyInput,
    /// The engine handled the key; the host's default action must not run
    pub consumed: bool,
}

fn now() -> std::time::Instant {
    Instant::now().into_std()
}

/// Drive `engine` until `shutdown` fires or the event channel closes, then
/// dispose it.
pub async fn run_suggestion_loop(
    mut engine: SuggestionEngine,
    mut events: UnboundedReceiver<EditorEvent>,
    key_outcomes: Option<UnboundedSender<KeyOutcome>>,
    shutdown: CancellationToken,
    tick: Duration,
) {
    let (reply_tx, mut replies) = mpsc::unbounded_channel::<SuggestionReply>();
    let mut interval = time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!(?tick, "suggestion loop started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => {
                    let key = match &event {
                        EditorEvent::Key(key) => Some(*key),
                        _ => None,
                    };
                    let consumed = engine.handle_event(now(), event);
                    if let (Some(key), Some(outcomes)) = (key, &key_outcomes) {
                        // Host stopped listening; keep serving the editor
                        let _ = outcomes.send(KeyOutcome { key, consumed });
                    }
                }
                None => break,
            },
            Some(reply) = replies.recv() => engine.on_reply(reply),
            _ = interval.tick() => {
                if let Some(request) = engine.poll(now()) {
                    let reply_tx = reply_tx.clone();
                    tokio::spawn(async move {
                        // Loop already gone when the send fails
                        let _ = reply_tx.send(request.send().await);
                    });
                }
            }
        }
    }

    engine.dispose();
    tracing::debug!("suggestion loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::{lock_editor, shared, EditorHost, Key, KeyInput, Position, TextBuffer};
    use crate::llm::mock_provider::MockProvider;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_loop_displays_after_inactivity_and_accepts() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut buffer = TextBuffer::new("// add two numbers").with_listener(tx.clone());
        buffer.set_cursor(Position::new(1, 19));
        let editor = shared(buffer.with_extension("rs"));

        let provider = MockProvider::new().with_response("fn add(a: i32, b: i32) -> i32 { a + b }");
        let engine = SuggestionEngine::new(editor.clone(), Arc::new(provider.clone()), now());
        let shutdown = CancellationToken::new();
        let (outcome_tx, mut outcomes) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_suggestion_loop(
            engine,
            rx,
            Some(outcome_tx),
            shutdown.clone(),
            DEFAULT_TICK,
        ));

        {
            let mut editor = lock_editor(&editor);
            let end = editor.line_max_column(1);
            editor
                .apply_edit(
                    crate::editor::TextRange::new(1, end, 1, end),
                    " ",
                    "keyboard",
                )
                .unwrap();
        }

        time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(provider.call_count(), 0);

        time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(provider.call_count(), 1);
        assert_eq!(lock_editor(&editor).content(), "// add two numbers \n");

        tx.send(EditorEvent::Key(KeyInput::plain(Key::Tab))).unwrap();
        time::sleep(DEFAULT_TICK).await;
        assert_eq!(
            lock_editor(&editor).content(),
            "// add two numbers \nfn add(a: i32, b: i32) -> i32 { a + b }"
        );
        assert_eq!(
            outcomes.try_recv().unwrap(),
            KeyOutcome {
                key: KeyInput::plain(Key::Tab),
                consumed: true,
            }
        );

        // Nothing displayed now, so Tab falls through to the host
        tx.send(EditorEvent::Key(KeyInput::plain(Key::Tab))).unwrap();
        time::sleep(DEFAULT_TICK).await;
        assert!(!outcomes.try_recv().unwrap().consumed);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_disposes_and_clears() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut buffer = TextBuffer::new("// todo").with_listener(tx.clone());
        buffer.set_cursor(Position::new(1, 8));
        let editor = shared(buffer);

        let provider = MockProvider::new().with_response("later();");
        let engine = SuggestionEngine::new(editor.clone(), Arc::new(provider), now());
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_suggestion_loop(engine, rx, None, shutdown.clone(), DEFAULT_TICK));

        tx.send(EditorEvent::ContentChanged {
            source: "keyboard".to_string(),
        })
        .unwrap();
        time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(lock_editor(&editor).content(), "// todo\n");

        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(lock_editor(&editor).content(), "// todo");
    }
}
