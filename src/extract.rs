use std::sync::LazyLock;

use regex::Regex;

use crate::model::ContactRecord;

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\(\d{2}\) \d{4,5}-\d{4}").unwrap());
static NON_DIGIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\D").unwrap());

pub const NAME_PLACEHOLDER: &str = "N/A";

/// What was read from a result's details panel.
#[derive(Debug, Clone, Default)]
pub struct DetailPanel {
    /// Info-line texts in rendering order.
    pub fragments: Vec<String>,
    /// Title heading, when visible.
    pub name: Option<String>,
    /// Category button label, when visible.
    pub category: Option<String>,
}

/// Chooses which fragment is the address.
pub trait AddressRule {
    fn pick<'a>(&self, fragments: &'a [String]) -> Option<&'a str>;
}

/// The panel renders the address line first. Positional and brittle: it breaks
/// as soon as the page reorders its info lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstFragment;

impl AddressRule for FirstFragment {
    fn pick<'a>(&self, fragments: &'a [String]) -> Option<&'a str> {
        fragments.first().map(String::as_str)
    }
}

/// First fragment shaped like `(DD) DDDD[D]-DDDD`.
pub fn find_phone(fragments: &[String]) -> Option<&str> {
    fragments
        .iter()
        .map(String::as_str)
        .find(|f| PHONE_RE.is_match(f))
}

/// Digits-only identity key.
pub fn phone_key(phone: &str) -> String {
    NON_DIGIT_RE.replace_all(phone, "").into_owned()
}

/// Build a record from a details panel, or `None` when no phone is present.
pub fn extract_contact(
    panel: &DetailPanel,
    fallback_category: &str,
    rule: &impl AddressRule,
) -> Option<ContactRecord> {
    let phone = find_phone(&panel.fragments)?;
    let key = phone_key(phone);
    if key.is_empty() {
        return None;
    }

    let address = rule.pick(&panel.fragments).unwrap_or(NAME_PLACEHOLDER);
    let name = non_blank(panel.name.as_deref()).unwrap_or(NAME_PLACEHOLDER);
    let category = non_blank(panel.category.as_deref()).unwrap_or(fallback_category);

    Some(ContactRecord {
        key,
        name: name.to_string(),
        address: address.to_string(),
        phone: phone.to_string(),
        category: category.to_string(),
    })
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel(fragments: &[&str]) -> DetailPanel {
        DetailPanel {
            fragments: fragments.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn key_comes_from_first_phone_in_order() {
        let p = panel(&["Rua A, 123", "(11) 91234-5678", "(21) 3456-7890"]);
        let r = extract_contact(&p, "Padaria", &FirstFragment).unwrap();
        assert_eq!(r.key, "11912345678");
        assert_eq!(r.phone, "(11) 91234-5678");
        assert_eq!(r.address, "Rua A, 123");
    }

    #[test]
    fn four_digit_prefix_matches() {
        let p = panel(&["Av. B, 9", "(21) 3456-7890"]);
        let r = extract_contact(&p, "Bar", &FirstFragment).unwrap();
        assert_eq!(r.key, "2134567890");
    }

    #[test]
    fn no_phone_means_no_record() {
        let p = panel(&["Rua A, 123", "padaria.com.br", "Aberto 24 horas", "11 91234-5678"]);
        assert!(extract_contact(&p, "Padaria", &FirstFragment).is_none());
        assert!(extract_contact(&panel(&[]), "Padaria", &FirstFragment).is_none());
    }

    #[test]
    fn phone_must_start_the_fragment() {
        let p = panel(&["Tel: (11) 91234-5678"]);
        assert!(find_phone(&p.fragments).is_none());
    }

    #[test]
    fn name_and_category_fallbacks() {
        let mut p = panel(&["Rua A, 123", "(11) 91234-5678"]);
        p.name = Some("  ".into());
        let r = extract_contact(&p, "Padaria", &FirstFragment).unwrap();
        assert_eq!(r.name, NAME_PLACEHOLDER);
        assert_eq!(r.category, "Padaria");

        p.name = Some("Padaria Pão Quente".into());
        p.category = Some("Confeitaria".into());
        let r = extract_contact(&p, "Padaria", &FirstFragment).unwrap();
        assert_eq!(r.name, "Padaria Pão Quente");
        assert_eq!(r.category, "Confeitaria");
    }

    #[test]
    fn address_rule_is_replaceable() {
        struct Labelled;
        impl AddressRule for Labelled {
            fn pick<'a>(&self, fragments: &'a [String]) -> Option<&'a str> {
                fragments.iter().map(String::as_str).find(|f| f.starts_with("Rua"))
            }
        }
        let p = panel(&["(11) 91234-5678", "Rua C, 5"]);
        assert_eq!(extract_contact(&p, "x", &Labelled).unwrap().address, "Rua C, 5");
        assert_eq!(extract_contact(&p, "x", &FirstFragment).unwrap().address, "(11) 91234-5678");
    }

    #[test]
    fn key_strips_everything_but_digits() {
        assert_eq!(phone_key("(11) 91234-5678"), "11912345678");
    }
}
