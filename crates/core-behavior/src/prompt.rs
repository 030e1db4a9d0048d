use crate::{BehaviorSummary, Locale};

/// Whole seconds, rounding halves up.
pub fn rounded_seconds(ms: u64) -> u64 {
    ms.saturating_add(500) / 1000
}

/// System prompt framing the question with the composing context.
pub fn system_prompt(summary: &BehaviorSummary, locale: Locale) -> String {
    let secs = rounded_seconds(summary.duration_ms);
    let edits = summary.edit_summary(locale);
    match locale {
        Locale::En => format!(
            "You are a kind assistant who supports the user.\n\
             The user is asking a question in the following situation. Take it into account and respond in the way that seems most appropriate.\n\
             Time spent typing: {secs} seconds\n\
             Edit summary: {edits}\n\
             Backspace count: {bs}\n\
             Inferred input behavior: {interp}\n\
             ---\n\
             Answer the user's question.",
            bs = summary.backspace_count,
            interp = summary.interpretation,
        ),
        Locale::Ja => format!(
            "あなたはユーザーをサポートする親切なアシスタントです。\n\
             ユーザーは現在、以下の状況で質問をしています。これを考慮して、より適切と思われる応答をしてください。\n\
             入力にかかった時間: {secs}秒\n\
             編集の概要: {edits}\n\
             バックスペース使用回数: {bs}回\n\
             入力行動の推測: {interp}\n\
             ---\n\
             ユーザーの質問に答えてください。",
            bs = summary.backspace_count,
            interp = summary.interpretation,
        ),
    }
}
