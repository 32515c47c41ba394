use maestro_core::{ChatMessage, ChatRequest};
use serde::{Deserialize, Serialize};

/// How many characters one trimming pass removes.
const TRIM_CHUNK: usize = 10;

/// Estimates the token count of `text` as one token per 4 characters.
///
/// A fixed heuristic, not a tokenizer; callers depend on this exact ratio.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Where oversized request content is cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrimStrategy {
    /// Pass the request through unchanged.
    None,
    /// Remove characters from the start.
    Start,
    /// Remove characters from both sides of the midpoint.
    Middle,
    /// Remove characters from the end.
    End,
}

/// Removes 10 characters at a time per `strategy` until the estimated token
/// count of the remaining text is within `limit`.
pub fn trim_to_limit(text: &str, limit: usize, strategy: TrimStrategy) -> String {
    if strategy == TrimStrategy::None {
        return text.to_string();
    }

    let mut chars: Vec<char> = text.chars().collect();
    while chars.len() / 4 > limit && !chars.is_empty() {
        let take = TRIM_CHUNK.min(chars.len());
        match strategy {
            TrimStrategy::Start => {
                chars.drain(..take);
            }
            TrimStrategy::End => {
                let keep = chars.len() - take;
                chars.truncate(keep);
            }
            TrimStrategy::Middle => {
                let mid = chars.len() / 2;
                let half = take / 2;
                let start = mid.saturating_sub(half);
                let end = (mid + (take - half)).min(chars.len());
                chars.drain(start..end);
            }
            TrimStrategy::None => unreachable!("handled above"),
        }
    }
    chars.into_iter().collect()
}

/// Fits a request to the fleet's token budget.
///
/// With [`TrimStrategy::None`] the request passes through unchanged.
/// Otherwise the budget is `floor(max_token_limit * (1 - buffer_fraction))`,
/// all message contents are concatenated with a single space, trimmed per
/// `strategy`, and the request's messages are replaced by a single user-role
/// message holding the trimmed text.
pub fn optimize_request(
    request: ChatRequest,
    strategy: TrimStrategy,
    buffer_fraction: f64,
    max_token_limit: usize,
) -> ChatRequest {
    if strategy == TrimStrategy::None {
        return request;
    }

    let adjusted_limit = (max_token_limit as f64 * (1.0 - buffer_fraction)).floor() as usize;
    let trimmed = trim_to_limit(&request.text(), adjusted_limit, strategy);

    let mut optimized = ChatRequest::new(vec![ChatMessage::user(trimmed)]);
    optimized.id = request.id;
    optimized.created_at = request.created_at;
    optimized
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use maestro_core::Role;

    #[test]
    fn four_characters_per_token() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens(&"x".repeat(600)), 150);
    }

    #[test]
    fn estimate_counts_characters_not_bytes() {
        // Four multi-byte characters are still one token.
        assert_eq!(estimate_tokens("éééé"), 1);
    }

    #[test]
    fn no_trimming_when_under_limit() {
        let text = "short enough";
        assert_eq!(trim_to_limit(text, 100, TrimStrategy::End), text);
    }

    #[test]
    fn start_trim_keeps_the_tail() {
        let text = format!("{}{}", "x".repeat(100), "tail");
        let trimmed = trim_to_limit(&text, 10, TrimStrategy::Start);
        assert!(trimmed.ends_with("tail"));
        assert!(estimate_tokens(&trimmed) <= 10);
    }

    #[test]
    fn end_trim_keeps_the_head() {
        let text = format!("{}{}", "head", "x".repeat(100));
        let trimmed = trim_to_limit(&text, 10, TrimStrategy::End);
        assert!(trimmed.starts_with("head"));
        assert!(estimate_tokens(&trimmed) <= 10);
    }

    #[test]
    fn middle_trim_keeps_both_ends() {
        let text = format!("head{}tail", "x".repeat(200));
        let trimmed = trim_to_limit(&text, 10, TrimStrategy::Middle);
        assert!(trimmed.starts_with("head"));
        assert!(trimmed.ends_with("tail"));
        assert!(estimate_tokens(&trimmed) <= 10);
    }

    #[test]
    fn optimized_request_fits_adjusted_budget() {
        // 600 characters ≈ 150 tokens against a limit of 100 with a 10%
        // buffer: the result must fit 90 tokens.
        let request = ChatRequest::user("x".repeat(600));
        let optimized = optimize_request(request, TrimStrategy::End, 0.1, 100);
        assert!(estimate_tokens(&optimized.text()) <= 90);
    }

    #[test]
    fn optimization_collapses_to_a_single_user_message() {
        let request = ChatRequest::new(vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hello"),
            ChatMessage::assistant("hi"),
        ]);
        let id = request.id;
        let optimized = optimize_request(request, TrimStrategy::End, 0.0, 1000);

        assert_eq!(optimized.id, id);
        assert_eq!(optimized.messages.len(), 1);
        assert_eq!(optimized.messages[0].role, Role::User);
        assert_eq!(optimized.messages[0].content, "be brief hello hi");
    }

    #[test]
    fn strategy_none_passes_through() {
        let request = ChatRequest::new(vec![
            ChatMessage::system("a"),
            ChatMessage::user("x".repeat(1000)),
        ]);
        let optimized = optimize_request(request.clone(), TrimStrategy::None, 0.1, 10);
        assert_eq!(optimized.messages.len(), 2);
        assert_eq!(optimized.text(), request.text());
    }

    #[test]
    fn strategy_serialization() {
        assert_eq!(
            serde_json::to_string(&TrimStrategy::Middle).unwrap(),
            "\"middle\""
        );
        let parsed: TrimStrategy = serde_json::from_str("\"start\"").unwrap();
        assert_eq!(parsed, TrimStrategy::Start);
    }
}
