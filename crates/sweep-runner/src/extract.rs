use std::sync::OnceLock;

use regex::Regex;

fn rate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"prompt eval rate:\s+([\d.]+)\s+tokens/s").unwrap())
}

/// Pull the prompt eval rate out of the engine's verbose output. Returns
/// `None` when no matching line exists; that absence is data for the failure
/// classifier, not an error.
pub fn prompt_eval_rate(output: &str) -> Option<f64> {
    rate_re()
        .captures(output)?
        .get(1)?
        .as_str()
        .parse::<f64>()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_rate_from_verbose_output() {
        let output = "total duration:       2m1.7s\n\
            prompt eval count:    8192 token(s)\n\
            prompt eval rate:     123.45 tokens/s\n\
            eval rate:            12.01 tokens/s\n";
        assert_eq!(prompt_eval_rate(output), Some(123.45));
    }

    #[test]
    fn first_match_wins() {
        let output = "prompt eval rate: 10.5 tokens/s\nprompt eval rate: 99.9 tokens/s\n";
        assert_eq!(prompt_eval_rate(output), Some(10.5));
    }

    #[test]
    fn decode_rate_line_alone_does_not_match() {
        // "eval rate:" without the "prompt" prefix is the decode rate.
        assert_eq!(prompt_eval_rate("eval rate: 12.01 tokens/s\n"), None);
    }

    #[test]
    fn empty_output_has_no_rate() {
        assert_eq!(prompt_eval_rate(""), None);
    }

    #[test]
    fn malformed_number_is_absent_not_an_error() {
        assert_eq!(prompt_eval_rate("prompt eval rate: ... tokens/s"), None);
    }

    #[test]
    fn integer_rate_parses() {
        assert_eq!(prompt_eval_rate("prompt eval rate: 250 tokens/s"), Some(250.0));
    }
}
