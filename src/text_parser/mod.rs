//! Pure rule-based extraction of budget/items/recipient from Korean free text
//! (spec §4.1). Never throws; missing signals yield `None`/empty, matching
//! the source's exception-free design.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::{BudgetRange, Gender, Occasion, RecipientInfo, Relation};

lazy_static! {
    static ref SINGLE_AMOUNT: Regex =
        Regex::new(r"(\d+(?:\.\d+)?)\s*(천|만|백만|억)?\s*원?").unwrap();
    static ref RANGE_CANONICAL: Regex = Regex::new(
        r"(\d+(?:\.\d+)?)\s*(천|만|백만)?\s*(?:~|-|에서부터)\s*(\d+(?:\.\d+)?)\s*(천|만|백만)?\s*원?"
    )
    .unwrap();
    static ref FLEXIBLE: Regex = Regex::new(r"(약|대략|정도|쯤|내외|전후)").unwrap();
    static ref AGE_GROUP: Regex = Regex::new(r"(\d{1,2})\s*대").unwrap();
}

/// Common shopping nouns (spec §4.1: "part of the spec and must be enumerable
/// from configuration"). Kept as a plain constant slice rather than an
/// external file since the crate has no config-loading layer for data tables.
const COMMON_ITEMS: &[&str] = &[
    "노트북",
    "키보드",
    "마우스",
    "모니터",
    "이어폰",
    "헤드폰",
    "스피커",
    "카메라",
    "시계",
    "가방",
    "지갑",
    "신발",
    "옷",
    "화장품",
    "향수",
    "액세서리",
    "에어프라이어",
    "청소기",
    "가습기",
    "공기청정기",
    "전자레인지",
    "커피머신",
    "믹서기",
    "선풍기",
    "히터",
];

const PRICE_TOKENS: &[&str] = &["원", "만원", "천원", "예산"];

const RELATIONS: &[(&str, Relation)] = &[
    ("친구", Relation::Friend),
    ("동료", Relation::Colleague),
    ("상사", Relation::Boss),
    ("부모님", Relation::Parent),
    ("엄마", Relation::Mother),
    ("아빠", Relation::Father),
    ("여자친구", Relation::Girlfriend),
    ("남자친구", Relation::Boyfriend),
    ("아내", Relation::Wife),
    ("남편", Relation::Husband),
    ("자녀", Relation::Child),
    ("아들", Relation::Son),
    ("딸", Relation::Daughter),
    ("선생님", Relation::Teacher),
    ("교수님", Relation::Professor),
];

const MALE_KEYWORDS: &[&str] = &["남자", "남성", "아빠", "아들", "남편", "남자친구"];
const FEMALE_KEYWORDS: &[&str] = &["여자", "여성", "엄마", "딸", "아내", "여자친구"];

const OCCASIONS: &[(&str, Occasion)] = &[
    ("생일", Occasion::Birthday),
    ("퇴사", Occasion::Farewell),
    ("입사", Occasion::Welcome),
    ("승진", Occasion::Promotion),
    ("결혼", Occasion::Wedding),
    ("기념일", Occasion::Anniversary),
    ("크리스마스", Occasion::Christmas),
    ("발렌타인", Occasion::Valentine),
    ("화이트데이", Occasion::Whiteday),
    ("어버이날", Occasion::ParentsDay),
    ("스승의날", Occasion::TeachersDay),
    ("졸업", Occasion::Graduation),
    ("입학", Occasion::Enrollment),
];

fn unit_multiplier(unit: &str) -> Option<f64> {
    match unit {
        "천" => Some(1_000.0),
        "만" => Some(10_000.0),
        "백만" => Some(1_000_000.0),
        "억" => Some(100_000_000.0),
        _ => None,
    }
}

/// Converts a matched number + optional unit into won. A bare number with no
/// unit is treated as already-in-won above 10 000, or as `N` 만원 otherwise.
fn parse_korean_number(num_str: &str, unit: Option<&str>) -> Option<f64> {
    let base: f64 = num_str.parse().ok()?;
    if let Some(mult) = unit.and_then(unit_multiplier) {
        return Some(base * mult);
    }
    if base > 10_000.0 {
        Some(base)
    } else if base > 0.0 && base <= 1000.0 {
        Some(base * 10_000.0)
    } else {
        Some(base)
    }
}

pub fn extract_budget(text: &str) -> Option<BudgetRange> {
    let is_flexible = FLEXIBLE.is_match(text);

    if let Some(caps) = RANGE_CANONICAL.captures(text) {
        let min_val = parse_korean_number(&caps[1], caps.get(2).map(|m| m.as_str()));
        let max_val = parse_korean_number(&caps[3], caps.get(4).map(|m| m.as_str()));
        if let (Some(min_val), Some(max_val)) = (min_val, max_val) {
            return Some(BudgetRange {
                min_price: min_val as i64,
                max_price: max_val as i64,
                total_budget: None,
                is_flexible,
            });
        }
    }

    let amounts: Vec<f64> = SINGLE_AMOUNT
        .captures_iter(text)
        .filter_map(|caps| parse_korean_number(&caps[1], caps.get(2).map(|m| m.as_str())))
        .collect();

    if let Some(&base_amount) = amounts.iter().max_by(|a, b| a.total_cmp(b)) {
        return Some(BudgetRange {
            min_price: (base_amount * 0.8) as i64,
            max_price: (base_amount * 1.2) as i64,
            total_budget: Some(base_amount as i64),
            is_flexible,
        });
    }

    None
}

pub fn extract_items(text: &str) -> Vec<String> {
    let mut found: Vec<String> = COMMON_ITEMS
        .iter()
        .filter(|item| text.contains(*item))
        .map(|item| item.to_string())
        .collect();

    if text.contains('+') || text.contains(',') {
        for part in text.split(['+', ',']) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let starts_with_digit = part.chars().next().is_some_and(|c| c.is_ascii_digit());
            let already_found = found.iter().any(|f| f == part);
            let is_price_token = PRICE_TOKENS.iter().any(|kw| part.contains(kw));
            if !starts_with_digit && !already_found && !is_price_token {
                found.push(part.to_string());
            }
        }
    }

    found
}

pub fn extract_recipient_info(text: &str) -> Option<RecipientInfo> {
    let relation = RELATIONS
        .iter()
        .find(|(korean, _)| text.contains(korean))
        .map(|(_, r)| *r);

    let gender = if MALE_KEYWORDS.iter().any(|kw| text.contains(kw)) {
        Some(Gender::Male)
    } else if FEMALE_KEYWORDS.iter().any(|kw| text.contains(kw)) {
        Some(Gender::Female)
    } else {
        None
    };

    let age_group = AGE_GROUP
        .captures(text)
        .map(|caps| format!("{}대", &caps[1]));

    let occasion = OCCASIONS
        .iter()
        .find(|(korean, _)| text.contains(korean))
        .map(|(_, o)| *o);

    let info = RecipientInfo {
        relation,
        gender,
        age_group,
        occasion,
    };

    if info.is_empty() {
        None
    } else {
        Some(info)
    }
}

pub fn parse_user_input(text: &str) -> (Option<BudgetRange>, Vec<String>, Option<RecipientInfo>) {
    (
        extract_budget(text),
        extract_items(text),
        extract_recipient_info(text),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_amount_applies_manwon_assumption() {
        let budget = extract_budget("5만원 선물 추천해줘").unwrap();
        assert_eq!(budget.total_budget, Some(50_000));
        assert_eq!(budget.min_price, 40_000);
        assert_eq!(budget.max_price, 60_000);
        assert!(!budget.is_flexible);
    }

    #[test]
    fn flexibility_keyword_is_detected() {
        let budget = extract_budget("약 5만원 정도").unwrap();
        assert!(budget.is_flexible);
    }

    #[test]
    fn range_pattern_yields_min_max_without_total() {
        let budget = extract_budget("3만원에서부터 5만원").unwrap();
        assert_eq!(budget.min_price, 30_000);
        assert_eq!(budget.max_price, 50_000);
    }

    #[test]
    fn items_split_on_plus_and_comma() {
        let items = extract_items("노트북+마우스+키보드 100만원에 맞춰줘");
        assert_eq!(items, vec!["노트북", "마우스", "키보드"]);
    }

    #[test]
    fn recipient_info_combines_signals() {
        let info = extract_recipient_info("30대 남자 동료 퇴사 선물 5만원").unwrap();
        assert_eq!(info.relation, Some(Relation::Colleague));
        assert_eq!(info.gender, Some(Gender::Male));
        assert_eq!(info.age_group, Some("30대".to_string()));
        assert_eq!(info.occasion, Some(Occasion::Farewell));
    }

    #[test]
    fn no_recipient_signal_yields_none() {
        assert!(extract_recipient_info("5만원짜리 키보드 추천해줘").is_none());
    }

    #[test]
    fn idempotent_across_repeated_parses() {
        let text = "30대 남자 동료 퇴사 선물 5만원";
        assert_eq!(extract_budget(text), extract_budget(text));
        assert_eq!(extract_items(text), extract_items(text));
        assert_eq!(extract_recipient_info(text), extract_recipient_info(text));
    }
}
