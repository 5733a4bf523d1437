use proptest::prelude::*;
use tokenwind::generator::generate_universe;
use tokenwind::registry::Rules;
use tokenwind::scanner::{Matchers, extract_classes, is_valid_class_name};
use tokenwind::tokens::parse_tokens;
use tokenwind::variants::{merge_media_variants, parse_media_source};

fn token_source() -> impl Strategy<Value = String> {
    let category = prop::sample::select(vec!["spacing", "color", "radius", "z", "unknown"]);
    let key = "[a-z0-9]{1,4}";
    prop::collection::vec((category, key, "[0-9]{1,3}px"), 0..12).prop_map(|decls| {
        let body = decls
            .into_iter()
            .map(|(category, key, value)| format!("  --{}-{}: {};", category, key, value))
            .collect::<Vec<_>>()
            .join("\n");
        format!(":root {{\n{}\n}}\n", body)
    })
}

proptest! {
    #[test]
    fn universe_generation_is_deterministic(source in token_source(), media in "(wide \\(min-width: [0-9]{2}rem\\)\n)?") {
        let rules = Rules::defaults();
        let build = || {
            let tokens = parse_tokens(&source, &rules.categories());
            let variants = merge_media_variants(&rules.variants, parse_media_source(&media));
            generate_universe(&rules, &tokens, &variants)
        };
        let first = build();
        let second = build();
        prop_assert_eq!(first.raw_text(), second.raw_text());
        prop_assert_eq!(first.len(), second.len());
    }

    #[test]
    fn every_base_entry_has_all_variants(source in token_source()) {
        let rules = Rules::defaults();
        let tokens = parse_tokens(&source, &rules.categories());
        let universe = generate_universe(&rules, &tokens, &rules.variants);
        for entry in &universe.entries()[..universe.base_count()] {
            for variant in &rules.variants {
                let key = format!("{}:{}", variant.name(), entry.lookup_key);
                prop_assert!(universe.contains(&key), "missing {}", key);
            }
        }
    }

    #[test]
    fn extractor_never_panics_and_yields_valid_names(text in "\\PC{0,200}") {
        let found = extract_classes(&text, &Matchers::default());
        for class in &found {
            prop_assert!(is_valid_class_name(class), "invalid class {:?}", class);
        }
    }

    #[test]
    fn extractor_handles_unterminated_markup(prefix in "[a-z -]{0,20}", open in prop::sample::select(vec!["class=\"", "className={`", "clsx('", "cn(\"a\", `${"])) {
        let text = format!("<div {}{}", open, prefix);
        let found = extract_classes(&text, &Matchers::default());
        prop_assert!(found.iter().all(|class| is_valid_class_name(class)));
    }
}
