#[cfg(test)]
mod tests {
    use crate::cache::TransformCache;
    use crate::config::PreviewConfig;
    use crate::diagnostics::DiagnosticKind;
    use crate::linker::{link, link_with_cache, LinkResult, ResolutionEntry};
    use crate::tree::VirtualFileTree;

    fn tree_of(files: &[(&str, &str)]) -> VirtualFileTree {
        let mut tree = VirtualFileTree::new();
        for (path, content) in files {
            tree.create_file(path, content).unwrap();
        }
        tree
    }

    fn inline_code<'r>(result: &'r LinkResult, key: &str) -> &'r str {
        match result.resolution_map.get(key) {
            Some(ResolutionEntry::Inline { code }) => code,
            other => panic!("expected inline module at {}, got {:?}", key, other),
        }
    }

    #[test]
    fn test_alias_import_and_package_external() {
        let tree = tree_of(&[
            (
                "/App.js",
                "import Button from \"@/components/Button.js\";\nexport default function App() { return Button(); }\n",
            ),
            (
                "/components/Button.js",
                "import lib from \"some-lib\";\nexport default function Button() { return lib; }\n",
            ),
        ]);
        let result = link(&tree, "/App.js", &PreviewConfig::default());

        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        assert_eq!(result.inline_count(), 2);
        let externals: Vec<(&str, &str)> = result.externals().collect();
        assert_eq!(externals, vec![("some-lib", "https://esm.sh/some-lib")]);

        assert_eq!(result.entry_module_key, "vfs:/App.js");
        let app = inline_code(&result, "vfs:/App.js");
        assert!(app.contains("from \"vfs:/components/Button.js\""), "{}", app);
        assert!(app.contains("//# sourceURL=/App.js"));

        // bare specifiers are left for the import map
        let button = inline_code(&result, "vfs:/components/Button.js");
        assert!(button.contains("from \"some-lib\""));
        assert_eq!(result.reachable, vec!["/App.js", "/components/Button.js"]);
    }

    #[test]
    fn test_syntax_error_is_a_diagnostic_for_that_file() {
        let tree = tree_of(&[(
            "/App.js",
            "export default function App() {\n  return 1;\n",
        )]);
        let result = link(&tree, "/App.js", &PreviewConfig::default());

        assert_eq!(result.diagnostics.len(), 1);
        let diagnostic = &result.diagnostics[0];
        assert_eq!(diagnostic.file_path, "/App.js");
        assert_eq!(diagnostic.kind, DiagnosticKind::Transform);
        assert!(diagnostic.location.is_some());

        let stub = inline_code(&result, "vfs:/App.js");
        assert!(stub.starts_with("throw new Error("));
        assert!(result.modules[0].stubbed);
    }

    #[test]
    fn test_broken_file_does_not_stop_siblings() {
        let tree = tree_of(&[
            ("/App.js", "import \"./bad.js\";\nimport good from \"./good.js\";\nexport default good;\n"),
            ("/bad.js", "export const = ;"),
            ("/good.js", "import \"./leaf.js\";\nexport default 1;\n"),
            ("/leaf.js", "export const leaf = true;\n"),
        ]);
        let result = link(&tree, "/App.js", &PreviewConfig::default());

        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].file_path, "/bad.js");
        assert!(inline_code(&result, "vfs:/bad.js").starts_with("throw new Error("));
        assert!(inline_code(&result, "vfs:/good.js").contains("vfs:/leaf.js"));
        assert!(result.resolution_map.contains_key("vfs:/leaf.js"));
    }

    #[test]
    fn test_cycles_link_each_file_once() {
        let tree = tree_of(&[
            ("/a.js", "import { b } from \"./b.js\";\nexport const a = () => b;\n"),
            ("/b.js", "import { a } from \"./a.js\";\nexport const b = () => a;\n"),
        ]);
        let result = link(&tree, "/a.js", &PreviewConfig::default());

        assert!(result.diagnostics.is_empty());
        assert_eq!(result.reachable, vec!["/a.js", "/b.js"]);
        assert_eq!(result.modules.len(), 2);
        assert!(inline_code(&result, "vfs:/b.js").contains("\"vfs:/a.js\""));
    }

    #[test]
    fn test_relinking_is_deterministic() {
        let tree = tree_of(&[
            ("/App.jsx", "import { Card } from \"./Card\";\nimport \"./app.css\";\nimport x from \"lodash/get\";\nimport y from \"./missing.js\";\nexport default () => <Card x={x} y={y} />;\n"),
            ("/Card.jsx", "export const Card = (p) => <div {...p}>card</div>;\n"),
            ("/app.css", "body { margin: 0; }"),
        ]);
        let config = PreviewConfig::default();
        let first = link(&tree, "/App.jsx", &config);
        let second = link(&tree, "/App.jsx", &config);
        assert_eq!(first, second);

        let mut cache = TransformCache::new();
        let cached_once = link_with_cache(&tree, "/App.jsx", &config, &mut cache);
        let cached_twice = link_with_cache(&tree, "/App.jsx", &config, &mut cache);
        assert_eq!(cached_once, first);
        assert_eq!(cached_twice, first);
        assert!(cache.stats().0 >= 2);
    }

    #[test]
    fn test_styles_are_collected_and_stripped() {
        let tree = tree_of(&[
            (
                "/App.js",
                "import \"./styles.css\";\nimport Card from \"./components/Card.js\";\nconst lazy = () => import(\"./lazy.css\");\nexport default Card;\n",
            ),
            (
                "/components/Card.js",
                "import \"../styles.css\";\nimport \"./card.css\";\nexport default 1;\n",
            ),
            ("/styles.css", "body { margin: 0; }"),
            ("/components/card.css", ".card { padding: 4px; }"),
            ("/lazy.css", ".lazy {}"),
        ]);
        let result = link(&tree, "/App.js", &PreviewConfig::default());

        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        let styles: Vec<&str> = result
            .collected_styles
            .iter()
            .map(|s| s.path.as_str())
            .collect();
        assert_eq!(styles, vec!["/styles.css", "/components/card.css", "/lazy.css"]);

        let app = inline_code(&result, "vfs:/App.js");
        assert!(!app.contains("styles.css"), "{}", app);
        assert!(app.contains("Promise.resolve({})"), "{}", app);
        assert!(!result.resolution_map.contains_key("vfs:/styles.css"));
    }

    #[test]
    fn test_missing_and_malformed_imports_get_stubs() {
        let tree = tree_of(&[(
            "/App.js",
            "import a from \"./Missing\";\nimport b from \"https://cdn.example.com/b.js\";\nexport default [a, b];\n",
        )]);
        let result = link(&tree, "/App.js", &PreviewConfig::default());

        let kinds: Vec<DiagnosticKind> = result.diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![DiagnosticKind::MissingModule, DiagnosticKind::MalformedImport]
        );
        assert!(result.diagnostics.iter().all(|d| d.file_path == "/App.js"));
        assert_eq!(result.diagnostics[0].location.unwrap().line, 1);
        assert_eq!(result.diagnostics[1].location.unwrap().line, 2);

        assert!(inline_code(&result, "stub:missing/Missing").contains("throw new Error("));
        assert!(inline_code(&result, "stub:malformed/https://cdn.example.com/b.js")
            .contains("throw new Error("));

        let app = inline_code(&result, "vfs:/App.js");
        assert!(app.contains("\"stub:missing/Missing\""));
        assert!(app.contains("\"stub:malformed/https://cdn.example.com/b.js\""));
    }

    #[test]
    fn test_missing_entry() {
        let tree = VirtualFileTree::new();
        let result = link(&tree, "/App.jsx", &PreviewConfig::default());
        assert_eq!(result.entry_module_key, "vfs:/App.jsx");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::MissingModule);
        assert!(inline_code(&result, "vfs:/App.jsx").contains("does not exist"));
    }

    #[test]
    fn test_jsx_entry_pulls_in_runtime_and_probes_extensions() {
        let tree = tree_of(&[
            (
                "/App.jsx",
                "import Button from \"./Button\";\nexport default function App() { return <Button />; }\n",
            ),
            ("/Button.jsx", "export default () => <button>ok</button>;\n"),
        ]);
        let mut config = PreviewConfig::default();
        config.package_versions.insert("react".into(), "18.3.1".into());
        let result = link(&tree, "/App.jsx", &config);

        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        assert_eq!(
            result.resolution_map.get("react/jsx-runtime"),
            Some(&ResolutionEntry::External {
                url: "https://esm.sh/react@18.3.1/jsx-runtime".into()
            })
        );
        assert!(inline_code(&result, "vfs:/App.jsx").contains("vfs:/Button.jsx"));
        assert_eq!(result.modules[0].dependencies, vec!["/Button.jsx"]);
    }

    #[test]
    fn test_json_and_asset_modules() {
        let tree = tree_of(&[
            (
                "/App.js",
                "import data from \"./data.json\";\nimport logo from \"./logo.svg\";\nexport default [data, logo];\n",
            ),
            ("/data.json", "{\"title\": \"hi\"}\n"),
            ("/logo.svg", "<svg></svg>"),
        ]);
        let result = link(&tree, "/App.js", &PreviewConfig::default());

        assert!(result.diagnostics.is_empty());
        assert!(inline_code(&result, "vfs:/data.json").starts_with("export default {\"title\": \"hi\"};"));
        assert!(inline_code(&result, "vfs:/logo.svg").starts_with("export default \"/logo.svg\";"));
    }

    #[test]
    fn test_invalid_json_is_a_transform_diagnostic() {
        let tree = tree_of(&[
            ("/App.js", "import data from \"./data.json\";\nexport default data;\n"),
            ("/data.json", "{ nope }"),
        ]);
        let result = link(&tree, "/App.js", &PreviewConfig::default());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].file_path, "/data.json");
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::Transform);
    }

    #[test]
    fn test_probed_entry_is_installed_once() {
        let tree = tree_of(&[
            (
                "/App.jsx",
                "import { b } from \"./b.js\";\nexport default () => <p>{b}</p>;\n",
            ),
            ("/b.js", "import App from \"./App.jsx\";\nexport const b = () => App;\n"),
        ]);
        let result = link(&tree, "/App", &PreviewConfig::default());

        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        assert_eq!(result.entry_module_key, "vfs:/App.jsx");
        assert!(!result.resolution_map.contains_key("vfs:/App"));
        assert_eq!(result.inline_count(), 2);
        assert!(inline_code(&result, "vfs:/b.js").contains("\"vfs:/App.jsx\""));
    }

    #[test]
    fn test_missing_import_in_jsx_file_has_location() {
        let tree = tree_of(&[(
            "/App.jsx",
            "const n = 1;\nimport X from \"./Nope\";\nexport default () => <X n={n} />;\n",
        )]);
        let result = link(&tree, "/App.jsx", &PreviewConfig::default());

        assert_eq!(result.diagnostics.len(), 1);
        let diagnostic = &result.diagnostics[0];
        assert_eq!(diagnostic.kind, DiagnosticKind::MissingModule);
        let location = diagnostic.location.expect("location of the written import");
        assert_eq!((location.line, location.column), (2, 15));
    }
}
