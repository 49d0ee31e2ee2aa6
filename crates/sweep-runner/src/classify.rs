use std::fmt;

/// Coarse failure category assigned when no metric could be extracted. More
/// specific diagnoses take precedence over the generic `EngineError` bucket,
/// so an OOM message that also contains the word "error" is still an OOM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    OutOfMemory,
    ResourceAllocation,
    EngineError,
    ParseError,
    TimeoutOrNoOutput,
}

impl FailureCategory {
    /// The error string recorded in the result store. These match the
    /// historical document format consumed by the heatmap tooling.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::OutOfMemory => "CUDA OOM",
            FailureCategory::ResourceAllocation => "CUDA resource allocation error",
            FailureCategory::EngineError => "Ollama error",
            FailureCategory::ParseError => "Parse error",
            FailureCategory::TimeoutOrNoOutput => "Timeout or no output",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify captured engine output by case-insensitive signature search, in
/// priority order. `None` or empty output means the run produced nothing at
/// all (timeout territory).
pub fn classify(output: Option<&str>) -> FailureCategory {
    let output = match output {
        Some(text) if !text.is_empty() => text,
        _ => return FailureCategory::TimeoutOrNoOutput,
    };
    let lower = output.to_lowercase();
    if lower.contains("out of memory") || lower.contains("oom") {
        FailureCategory::OutOfMemory
    } else if lower.contains("cuda error") || lower.contains("resource allocation failed") {
        FailureCategory::ResourceAllocation
    } else if lower.contains("error") {
        FailureCategory::EngineError
    } else {
        FailureCategory::ParseError
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oom_beats_generic_error() {
        let output = "Error: CUDA out of memory while allocating buffer";
        assert_eq!(classify(Some(output)), FailureCategory::OutOfMemory);
    }

    #[test]
    fn oom_signature_is_case_insensitive() {
        assert_eq!(
            classify(Some("ggml_backend: OOM at layer 12")),
            FailureCategory::OutOfMemory
        );
    }

    #[test]
    fn cuda_error_maps_to_resource_allocation() {
        assert_eq!(
            classify(Some("CUDA error: resource allocation failed")),
            FailureCategory::ResourceAllocation
        );
    }

    #[test]
    fn generic_error_falls_through_to_engine_error() {
        assert_eq!(
            classify(Some("Error: something went wrong")),
            FailureCategory::EngineError
        );
    }

    #[test]
    fn clean_output_without_metric_is_parse_error() {
        assert_eq!(
            classify(Some("total duration: 2m1.7s\neval count: 2 token(s)")),
            FailureCategory::ParseError
        );
    }

    #[test]
    fn absent_or_empty_output_is_timeout() {
        assert_eq!(classify(None), FailureCategory::TimeoutOrNoOutput);
        assert_eq!(classify(Some("")), FailureCategory::TimeoutOrNoOutput);
    }

    #[test]
    fn recorded_strings_match_store_format() {
        assert_eq!(FailureCategory::OutOfMemory.as_str(), "CUDA OOM");
        assert_eq!(FailureCategory::TimeoutOrNoOutput.as_str(), "Timeout or no output");
    }
}
