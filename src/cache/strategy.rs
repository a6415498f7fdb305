use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

/// Key prefixes owned by each soft-deletable resource. Every key stored by
/// a service starts with `<namespace>:` so a write can drop the whole
/// namespace with a single pattern.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum CacheNamespace {
    Categories,
    Discounts,
    KitchenItems,
    KitchenStock,
    KitchenOrders,
}

impl CacheNamespace {
    pub fn prefix(&self) -> String {
        format!("{}:", self)
    }

    /// Glob matching every key of this namespace.
    pub fn pattern(&self) -> String {
        format!("{}:*", self)
    }

    pub fn id_key(&self, id: Uuid) -> String {
        generate_key(self.as_ref(), Some(&format!("id:{}", id)), None)
    }

    pub fn slug_key(&self, slug: &str) -> String {
        generate_key(self.as_ref(), Some(&format!("slug:{}", slug)), None)
    }

    /// Key for one page of a listing. Parameter order is part of the key,
    /// so callers pass them in a fixed order.
    pub fn list_key(&self, params: &[(&str, String)]) -> String {
        generate_key(self.as_ref(), Some("list"), Some(params))
    }
}

/// Builds `resource[:id][:k=v&k=v]`.
pub fn generate_key(
    resource_type: &str,
    resource_id: Option<&str>,
    params: Option<&[(&str, String)]>,
) -> String {
    let mut key = resource_type.to_string();

    if let Some(id) = resource_id {
        key.push(':');
        key.push_str(id);
    }

    if let Some(params) = params {
        key.push(':');
        let params_str = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        key.push_str(&params_str);
    }

    key
}

/// Glob match supporting `*` (any run, including empty) and `?` (exactly
/// one character), the subset of Redis `KEYS` syntax the services use.
pub fn matches_pattern(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();

    let (mut p, mut k) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut resume = 0usize;

    while k < key.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == key[k]) {
            p += 1;
            k += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            resume = k;
            p += 1;
        } else if let Some(star_at) = star {
            p = star_at + 1;
            resume += 1;
            k = resume;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }

    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[rstest]
    #[case("kitchen-stock:*", "kitchen-stock:id:1", true)]
    #[case("kitchen-stock:*", "kitchen-stock:", true)]
    #[case("kitchen-stock:*", "kitchen-orders:id:1", false)]
    #[case("kitchen-stock:*", "kitchen-stock", false)]
    #[case("*:list:*", "categories:list:page=1", true)]
    #[case("categories:id:?", "categories:id:7", true)]
    #[case("categories:id:?", "categories:id:77", false)]
    #[case("exact", "exact", true)]
    #[case("", "", true)]
    #[case("*", "", true)]
    fn glob_cases(#[case] pattern: &str, #[case] key: &str, #[case] expected: bool) {
        assert_eq!(matches_pattern(pattern, key), expected);
    }

    #[test]
    fn namespaces_render_as_kebab_case() {
        assert_eq!(CacheNamespace::KitchenStock.to_string(), "kitchen-stock");
        assert_eq!(
            CacheNamespace::from_str("kitchen-orders").unwrap(),
            CacheNamespace::KitchenOrders
        );
        assert_eq!(CacheNamespace::Discounts.pattern(), "discounts:*");
    }

    #[test]
    fn list_keys_keep_parameter_order() {
        let key = CacheNamespace::Categories.list_key(&[
            ("page", "2".to_string()),
            ("limit", "10".to_string()),
        ]);
        assert_eq!(key, "categories:list:page=2&limit=10");
    }

    #[test]
    fn namespace_patterns_do_not_overlap() {
        for a in CacheNamespace::iter() {
            for b in CacheNamespace::iter() {
                let key = b.id_key(Uuid::nil());
                assert_eq!(matches_pattern(&a.pattern(), &key), a == b);
            }
        }
    }

    proptest! {
        #[test]
        fn every_generated_key_matches_its_namespace(
            slug in "[a-z0-9-]{0,24}",
            page in 1u64..500,
        ) {
            for ns in CacheNamespace::iter() {
                let slug_key = ns.slug_key(&slug);
                let list_key = ns.list_key(&[("page", page.to_string())]);
                prop_assert!(matches_pattern(&ns.pattern(), &slug_key));
                prop_assert!(matches_pattern(&ns.pattern(), &list_key));
                prop_assert!(slug_key.starts_with(&ns.prefix()));
            }
        }

        #[test]
        fn literal_pattern_matches_only_itself(key in "[a-z:=&0-9]{0,32}", other in "[a-z:=&0-9]{0,32}") {
            prop_assert!(matches_pattern(&key, &key));
            prop_assert_eq!(matches_pattern(&key, &other), key == other);
        }
    }
}
