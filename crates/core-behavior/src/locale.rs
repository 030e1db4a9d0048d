//! Localized sentences used by the interpreter and the prompt builder.

use serde::Deserialize;

use crate::BehaviorClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ja,
}

impl Locale {
    pub fn as_str(self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Ja => "ja",
        }
    }

    pub(crate) fn class_sentence(self, class: BehaviorClass) -> &'static str {
        match (self, class) {
            (Locale::En, BehaviorClass::Decisive) => {
                "The user typed quickly and likely had a clear intent."
            }
            (Locale::En, BehaviorClass::Deliberate) => {
                "The user may have taken time to reflect or hesitated over the content. Many edits or backspaces were observed."
            }
            (Locale::En, BehaviorClass::Iterative) => {
                "The user appears to have revised the text several times while typing."
            }
            (Locale::En, BehaviorClass::Abandoned) => {
                "The user tried to type something but ended up deleting it."
            }
            (Locale::En, BehaviorClass::Standard) => "The user appears to have typed at a standard pace.",
            (Locale::Ja, BehaviorClass::Decisive) => {
                "ユーザーは迅速に入力し、明確な意図を持っていた可能性があります。"
            }
            (Locale::Ja, BehaviorClass::Deliberate) => {
                "ユーザーは時間をかけて熟考したか、入力内容に迷いがあった可能性があります。多くの編集やバックスペースが見られます。"
            }
            (Locale::Ja, BehaviorClass::Iterative) => {
                "ユーザーは何度か修正を加えながら入力したようです。"
            }
            (Locale::Ja, BehaviorClass::Abandoned) => {
                "ユーザーは何かを入力しようとしましたが、最終的に削除しました。"
            }
            (Locale::Ja, BehaviorClass::Standard) => "ユーザーは標準的なペースで入力したようです。",
        }
    }

    pub(crate) fn thinking_suffix(self) -> &'static str {
        match self {
            Locale::En => " The user may also have paused to think before sending.",
            Locale::Ja => " また、送信前には一定時間思考していた可能性があります。",
        }
    }

    pub(crate) fn no_edits(self) -> &'static str {
        match self {
            Locale::En => "No edits were made.",
            Locale::Ja => "編集はありませんでした。",
        }
    }

    pub(crate) fn edit_counts(self, edits: usize, added: usize, removed: usize) -> String {
        match self {
            Locale::En => {
                format!("{edits} edits, {added} chars added, {removed} chars removed")
            }
            Locale::Ja => {
                format!("編集回数: {edits}, 追加文字数: {added}, 削除文字数: {removed}")
            }
        }
    }
}
