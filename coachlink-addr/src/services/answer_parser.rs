//! Oracle answer parsing
//!
//! The oracle answers in free text. Each usable answer line looks like
//!
//! ```text
//! 用户标识: wx_001 | 地址分析结果: 江苏-无锡-江阴-顾山镇锡张路422号 (原文: ...)
//! ```
//!
//! Parsing is substring search only. Full-width colons and parentheses are
//! folded to ASCII first. A line with an identity but no usable address
//! parses to [`ExtractedAddress::Unrecognized`]; it is skipped by the caller,
//! never treated as a batch failure.

pub const IDENTITY_MARKER: &str = "用户标识:";
pub const ANSWER_MARKER: &str = "地址分析结果:";
pub const SOURCE_MARKER: &str = "(原文:";

/// Sentinel the oracle is told to emit when no address is present
pub const UNRECOGNIZED: &str = "无法识别";

/// Sentinel answers meaning "no address"
const SENTINELS: &[&str] = &[UNRECOGNIZED, "提取失败", "未识别", "无", "无地址", "null", "none"];

/// Address value parsed from one answer line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedAddress {
    Found(String),
    Unrecognized,
}

/// One answer line attributed to an identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAnswer {
    pub identity: String,
    pub address: ExtractedAddress,
}

fn normalize(line: &str) -> String {
    line.replace('：', ":").replace('（', "(").replace('）', ")")
}

/// Parse every identity-tagged answer of an oracle answer text
///
/// An identity line without an answer marker may have its answer on a
/// following untagged line; the identity carries forward to it. Answer
/// lines with no pending identity cannot be matched back to a message and
/// are dropped.
pub fn parse_answers(text: &str) -> Vec<ParsedAnswer> {
    let mut answers = Vec::new();
    let mut pending: Option<String> = None;

    for line in text.lines() {
        if let Some(parsed) = parse_line(line) {
            if let Some(identity) = pending.take() {
                answers.push(ParsedAnswer {
                    identity,
                    address: ExtractedAddress::Unrecognized,
                });
            }
            if normalize(line).contains(ANSWER_MARKER) {
                answers.push(parsed);
            } else {
                pending = Some(parsed.identity);
            }
        } else if normalize(line).contains(ANSWER_MARKER) {
            if let Some(identity) = pending.take() {
                answers.push(ParsedAnswer {
                    identity,
                    address: extract_address(line),
                });
            }
        }
    }

    if let Some(identity) = pending {
        answers.push(ParsedAnswer {
            identity,
            address: ExtractedAddress::Unrecognized,
        });
    }

    answers
}

fn parse_line(line: &str) -> Option<ParsedAnswer> {
    let line = normalize(line);
    let identity_start = line.find(IDENTITY_MARKER)? + IDENTITY_MARKER.len();
    let rest = &line[identity_start..];

    let identity_end = [rest.find('|'), rest.find(ANSWER_MARKER)]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(rest.len());
    let identity = rest[..identity_end]
        .trim()
        .trim_matches(|c: char| c == '*' || c == '`')
        .trim();
    if identity.is_empty() {
        return None;
    }

    Some(ParsedAnswer {
        identity: identity.to_string(),
        address: extract_address(rest),
    })
}

/// Address between the answer marker and the trailing source marker (or end
/// of line when the source marker is missing)
pub fn extract_address(text: &str) -> ExtractedAddress {
    let normalized = normalize(text);
    let start = match normalized.find(ANSWER_MARKER) {
        Some(idx) => idx + ANSWER_MARKER.len(),
        None => return ExtractedAddress::Unrecognized,
    };
    let tail = &normalized[start..];
    let end = tail.find(SOURCE_MARKER).unwrap_or(tail.len());

    let address = tail[..end]
        .trim()
        .trim_matches(|c: char| c == '"' || c == '“' || c == '”' || c == '|' || c == '`')
        .trim();

    if address.is_empty() || SENTINELS.iter().any(|s| address.eq_ignore_ascii_case(s)) {
        ExtractedAddress::Unrecognized
    } else {
        ExtractedAddress::Found(address.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_answer() {
        let answers = parse_answers(
            "用户标识: wx_001 | 地址分析结果: 江苏-无锡-江阴-顾山镇锡张路422号 (原文: 寄到江阴)",
        );
        assert_eq!(
            answers,
            vec![ParsedAnswer {
                identity: "wx_001".to_string(),
                address: ExtractedAddress::Found("江苏-无锡-江阴-顾山镇锡张路422号".to_string()),
            }]
        );
    }

    #[test]
    fn test_missing_source_marker_reads_to_end_of_line() {
        assert_eq!(
            extract_address("地址分析结果: 浙江-杭州-西湖-文三路478号  "),
            ExtractedAddress::Found("浙江-杭州-西湖-文三路478号".to_string())
        );
    }

    #[test]
    fn test_missing_answer_marker_is_unrecognized() {
        let answers = parse_answers("用户标识: wx_002 | 这条消息没有地址");
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].address, ExtractedAddress::Unrecognized);
    }

    #[test]
    fn test_sentinels_are_unrecognized() {
        for sentinel in ["无法识别", "提取失败", "无", "None", "\"\""] {
            let line = format!("地址分析结果: {} (原文: 你好)", sentinel);
            assert_eq!(extract_address(&line), ExtractedAddress::Unrecognized, "{}", sentinel);
        }
    }

    #[test]
    fn test_full_width_punctuation_and_chatter() {
        let text = "好的，以下是分析：\n\
                    1. 用户标识：wx_003 | 地址分析结果：广东-深圳-南山-科技园1栋（原文：发到科技园）\n\
                    2. 用户标识: **wx_004** 地址分析结果: 无法识别\n\
                    以上。";
        let answers = parse_answers(text);
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0].identity, "wx_003");
        assert_eq!(
            answers[0].address,
            ExtractedAddress::Found("广东-深圳-南山-科技园1栋".to_string())
        );
        assert_eq!(answers[1].identity, "wx_004");
        assert_eq!(answers[1].address, ExtractedAddress::Unrecognized);
    }

    #[test]
    fn test_untagged_lines_dropped() {
        assert!(parse_answers("地址分析结果: 江苏-无锡-江阴 (原文: x)").is_empty());
        assert!(parse_answers("用户标识:  | 地址分析结果: 江苏-无锡-江阴").is_empty());
        assert!(parse_answers("").is_empty());
    }

    #[test]
    fn test_answer_on_line_after_identity() {
        let text = "用户标识：wx_005\n\
                    地址分析结果：江苏-无锡-江阴-顾山镇锡张路422号（原文：寄到江阴）\n\
                    用户标识: wx_006\n\
                    用户标识: wx_007\n\
                    地址分析结果: 无法识别";
        let answers = parse_answers(text);
        assert_eq!(
            answers,
            vec![
                ParsedAnswer {
                    identity: "wx_005".to_string(),
                    address: ExtractedAddress::Found("江苏-无锡-江阴-顾山镇锡张路422号".to_string()),
                },
                ParsedAnswer {
                    identity: "wx_006".to_string(),
                    address: ExtractedAddress::Unrecognized,
                },
                ParsedAnswer {
                    identity: "wx_007".to_string(),
                    address: ExtractedAddress::Unrecognized,
                },
            ]
        );
    }
}
