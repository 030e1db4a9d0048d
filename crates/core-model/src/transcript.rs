use core_behavior::Locale;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    Final,
    Pending,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub status: MessageStatus,
    request_id: Option<u64>,
}

impl Message {
    pub fn is_pending(&self) -> bool {
        self.status == MessageStatus::Pending
    }
}

/// Ordered chat history shown above the input line.
///
/// At most one assistant placeholder is pending at a time; it is addressed by
/// the request id handed out by [`Transcript::push_exchange`] so an answer that
/// arrives after a new chat cannot land in the wrong conversation.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    next_request: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn pending_request(&self) -> Option<u64> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.is_pending())
            .and_then(|m| m.request_id)
    }

    /// Append the user's question and a pending assistant placeholder.
    pub fn push_exchange(&mut self, question: &str, locale: Locale) -> u64 {
        self.next_request += 1;
        let id = self.next_request;
        self.messages.push(Message {
            role: Role::User,
            text: question.to_string(),
            status: MessageStatus::Final,
            request_id: None,
        });
        self.messages.push(Message {
            role: Role::Assistant,
            text: pending_text(locale).to_string(),
            status: MessageStatus::Pending,
            request_id: Some(id),
        });
        id
    }

    /// Replace the placeholder for `request_id`. Returns false when no such
    /// placeholder exists (already resolved or cleared by a new chat).
    pub fn resolve(&mut self, request_id: u64, text: String, failed: bool) -> bool {
        let Some(msg) = self
            .messages
            .iter_mut()
            .find(|m| m.is_pending() && m.request_id == Some(request_id))
        else {
            return false;
        };
        msg.text = text;
        msg.status = if failed {
            MessageStatus::Failed
        } else {
            MessageStatus::Final
        };
        true
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

fn pending_text(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "Thinking...",
        Locale::Ja => "考え中...",
    }
}

/// Shown when the server replied successfully but without an answer.
pub fn missing_answer_text(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "Sorry, I could not get a response.",
        Locale::Ja => "申し訳ありません、応答を取得できませんでした。",
    }
}

pub fn error_text(locale: Locale, message: &str) -> String {
    match locale {
        Locale::En => format!("An error occurred: {message}"),
        Locale::Ja => format!("エラーが発生しました: {message}"),
    }
}
