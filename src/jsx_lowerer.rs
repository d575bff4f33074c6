//! JSX lowering
//!
//! Rewrites JSX elements and fragments in place into plain function calls,
//! either against the automatic runtime (`_jsx`, `_jsxs`, `_Fragment`) or a
//! classic pragma such as `React.createElement`.

use lazy_static::lazy_static;
use oxc_allocator::{Allocator, Box as oxc_box, CloneIn, Vec as ArenaVec};
use oxc_ast::ast::*;
use oxc_ast::AstBuilder;
use oxc_ast_visit::walk_mut::walk_expression;
use oxc_ast_visit::VisitMut;
use oxc_span::{GetSpan, Span, SPAN};
use regex::Regex;

use crate::config::{JsxConfig, JsxRuntime};

lazy_static! {
    static ref IDENTIFIER_RE: Regex = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap();
    static ref ENTITY_RE: Regex = Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").unwrap();
}

/// Runtime helpers referenced by lowered code (automatic runtime only).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeHelpers {
    pub jsx: bool,
    pub jsxs: bool,
    pub fragment: bool,
}

impl RuntimeHelpers {
    pub fn any(&self) -> bool {
        self.jsx || self.jsxs || self.fragment
    }

    /// `import { ... } from "{import_source}/jsx-runtime";` for the helpers in use.
    pub fn import_statement(&self, import_source: &str) -> Option<String> {
        if !self.any() {
            return None;
        }
        let mut names = Vec::new();
        if self.jsx {
            names.push("jsx as _jsx");
        }
        if self.jsxs {
            names.push("jsxs as _jsxs");
        }
        if self.fragment {
            names.push("Fragment as _Fragment");
        }
        Some(format!(
            "import {{ {} }} from \"{}/jsx-runtime\";\n",
            names.join(", "),
            import_source
        ))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// JSX LOWERER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct JsxLowerer<'a> {
    pub ast: AstBuilder<'a>,
    runtime: JsxRuntime,
    pragma: String,
    pragma_frag: String,
    pub helpers: RuntimeHelpers,
    /// Constructs that cannot be lowered, with the span of the offending node.
    pub errors: Vec<(String, Span)>,
}

impl<'a> JsxLowerer<'a> {
    pub fn new(allocator: &'a Allocator, config: &JsxConfig) -> Self {
        Self {
            ast: AstBuilder::new(allocator),
            runtime: config.runtime,
            pragma: config.pragma.clone(),
            pragma_frag: config.pragma_frag.clone(),
            helpers: RuntimeHelpers::default(),
            errors: Vec::new(),
        }
    }

    fn lower_jsx_element(&mut self, element: &JSXElement<'a>) -> Expression<'a> {
        let element_type = self.element_type(&element.opening_element.name);

        let mut props = self.ast.vec();
        let mut key: Option<Expression<'a>> = None;

        for item in &element.opening_element.attributes {
            match item {
                JSXAttributeItem::Attribute(attr) => {
                    let name = match &attr.name {
                        JSXAttributeName::Identifier(id) => id.name.to_string(),
                        JSXAttributeName::NamespacedName(ns) => {
                            format!("{}:{}", ns.namespace.name, ns.name.name)
                        }
                    };

                    let value = match &attr.value {
                        Some(JSXAttributeValue::StringLiteral(s)) => {
                            let decoded = self.ast.allocator.alloc_str(&decode_entities(&s.value));
                            self.ast.expression_string_literal(SPAN, decoded, None)
                        }
                        Some(JSXAttributeValue::Element(el)) => self.lower_jsx_element(el),
                        Some(JSXAttributeValue::ExpressionContainer(container)) => {
                            self.lower_jsx_expression(&container.expression)
                                .unwrap_or_else(|| self.ast.expression_identifier(SPAN, "undefined"))
                        }
                        Some(JSXAttributeValue::Fragment(frag)) => self.lower_jsx_fragment(frag),
                        None => self.ast.expression_boolean_literal(SPAN, true),
                    };

                    if name == "key" && self.runtime == JsxRuntime::Automatic {
                        key = Some(value);
                        continue;
                    }

                    let prop_key = self.property_key(&name);
                    props.push(self.ast.object_property_kind_object_property(
                        SPAN,
                        PropertyKind::Init,
                        prop_key,
                        value,
                        false,
                        false,
                        false,
                    ));
                }
                JSXAttributeItem::SpreadAttribute(spread) => {
                    let mut spread_expr = spread.argument.clone_in(self.ast.allocator);
                    self.visit_expression(&mut spread_expr);
                    props.push(
                        self.ast
                            .object_property_kind_spread_property(SPAN, spread_expr),
                    );
                }
            }
        }

        let children = self.lower_children(&element.children);
        self.build_call(element_type, props, children, key)
    }

    fn lower_jsx_fragment(&mut self, fragment: &JSXFragment<'a>) -> Expression<'a> {
        let fragment_type = match self.runtime {
            JsxRuntime::Automatic => {
                self.helpers.fragment = true;
                self.ast.expression_identifier(SPAN, "_Fragment")
            }
            JsxRuntime::Classic => {
                let pragma_frag = self.pragma_frag.clone();
                self.dotted_expression(&pragma_frag)
            }
        };
        let children = self.lower_children(&fragment.children);
        let props = self.ast.vec();
        self.build_call(fragment_type, props, children, None)
    }

    fn lower_children(&mut self, children: &[JSXChild<'a>]) -> Vec<Expression<'a>> {
        let mut lowered = Vec::new();
        for child in children {
            match child {
                JSXChild::Text(t) => {
                    if let Some(text) = clean_jsx_text(&t.value) {
                        let text_atom = self.ast.allocator.alloc_str(&text);
                        lowered.push(self.ast.expression_string_literal(SPAN, text_atom, None));
                    }
                }
                JSXChild::Element(el) => lowered.push(self.lower_jsx_element(el)),
                JSXChild::Fragment(frag) => lowered.push(self.lower_jsx_fragment(frag)),
                JSXChild::ExpressionContainer(container) => {
                    if let Some(expr) = self.lower_jsx_expression(&container.expression) {
                        lowered.push(expr);
                    }
                }
                JSXChild::Spread(spread) => {
                    self.errors.push((
                        "Spread children are not supported".to_string(),
                        spread.span,
                    ));
                }
            }
        }
        lowered
    }

    /// Assemble the final call for either runtime.
    fn build_call(
        &mut self,
        element_type: Expression<'a>,
        mut props: ArenaVec<'a, ObjectPropertyKind<'a>>,
        mut children: Vec<Expression<'a>>,
        key: Option<Expression<'a>>,
    ) -> Expression<'a> {
        let mut args = self.ast.vec();
        args.push(Argument::from(element_type));

        let callee = match self.runtime {
            JsxRuntime::Automatic => {
                let multiple = children.len() > 1;
                if !children.is_empty() {
                    let children_value = if multiple {
                        let mut elements = self.ast.vec();
                        for child in children.drain(..) {
                            elements.push(ArrayExpressionElement::from(child));
                        }
                        self.ast.expression_array(SPAN, elements)
                    } else {
                        children.remove(0)
                    };
                    props.push(self.ast.object_property_kind_object_property(
                        SPAN,
                        PropertyKind::Init,
                        self.property_key("children"),
                        children_value,
                        false,
                        false,
                        false,
                    ));
                }
                args.push(Argument::from(self.ast.expression_object(SPAN, props)));
                if let Some(key) = key {
                    args.push(Argument::from(key));
                }

                if multiple {
                    self.helpers.jsxs = true;
                    self.ast.expression_identifier(SPAN, "_jsxs")
                } else {
                    self.helpers.jsx = true;
                    self.ast.expression_identifier(SPAN, "_jsx")
                }
            }
            JsxRuntime::Classic => {
                let props_expr = if props.is_empty() {
                    self.ast.expression_null_literal(SPAN)
                } else {
                    self.ast.expression_object(SPAN, props)
                };
                args.push(Argument::from(props_expr));
                for child in children.drain(..) {
                    args.push(Argument::from(child));
                }
                let pragma = self.pragma.clone();
                self.dotted_expression(&pragma)
            }
        };

        self.ast.expression_call(
            SPAN,
            callee,
            None::<oxc_box<TSTypeParameterInstantiation>>,
            args,
            false,
        )
    }

    /// Intrinsic tags become strings; component references stay expressions.
    fn element_type(&self, name: &JSXElementName<'a>) -> Expression<'a> {
        match name {
            JSXElementName::Identifier(id) => {
                let tag_atom = self.ast.allocator.alloc_str(&id.name);
                self.ast.expression_string_literal(SPAN, tag_atom, None)
            }
            JSXElementName::IdentifierReference(id) => {
                self.ast.expression_identifier(SPAN, id.name.clone())
            }
            JSXElementName::NamespacedName(ns) => {
                let tag = format!("{}:{}", ns.namespace.name, ns.name.name);
                let tag_atom = self.ast.allocator.alloc_str(&tag);
                self.ast.expression_string_literal(SPAN, tag_atom, None)
            }
            JSXElementName::MemberExpression(me) => self.member_type(me),
            JSXElementName::ThisExpression(_) => self.ast.expression_this(SPAN),
        }
    }

    fn member_type(&self, me: &JSXMemberExpression<'a>) -> Expression<'a> {
        let object = match &me.object {
            JSXMemberExpressionObject::IdentifierReference(id) => {
                self.ast.expression_identifier(SPAN, id.name.clone())
            }
            JSXMemberExpressionObject::MemberExpression(inner) => self.member_type(inner),
            JSXMemberExpressionObject::ThisExpression(_) => self.ast.expression_this(SPAN),
        };
        Expression::from(self.ast.member_expression_static(
            SPAN,
            object,
            self.ast.identifier_name(SPAN, me.property.name.clone()),
            false,
        ))
    }

    /// `React.createElement` → member chain rooted at an identifier.
    fn dotted_expression(&self, dotted: &str) -> Expression<'a> {
        let mut parts = dotted.split('.').filter(|p| !p.is_empty());
        let head = self
            .ast
            .allocator
            .alloc_str(parts.next().unwrap_or("React"));
        let mut expr = self.ast.expression_identifier(SPAN, head);
        for part in parts {
            let name = self.ast.allocator.alloc_str(part);
            expr = Expression::from(self.ast.member_expression_static(
                SPAN,
                expr,
                self.ast.identifier_name(SPAN, name),
                false,
            ));
        }
        expr
    }

    fn property_key(&self, name: &str) -> PropertyKey<'a> {
        let atom = self.ast.allocator.alloc_str(name);
        if IDENTIFIER_RE.is_match(name) {
            PropertyKey::StaticIdentifier(self.ast.alloc(self.ast.identifier_name(SPAN, atom)))
        } else {
            PropertyKey::StringLiteral(self.ast.alloc(self.ast.string_literal(SPAN, atom, None)))
        }
    }

    /// `None` for empty containers such as `{/* comment */}`.
    fn lower_jsx_expression(&mut self, jsx_expr: &JSXExpression<'a>) -> Option<Expression<'a>> {
        let mut e = jsx_expr
            .as_expression()
            .map(|e| e.clone_in(self.ast.allocator))?;
        self.visit_expression(&mut e);
        Some(e)
    }
}

impl<'a> VisitMut<'a> for JsxLowerer<'a> {
    fn visit_expression(&mut self, expr: &mut Expression<'a>) {
        match expr {
            Expression::JSXElement(element) => {
                let lowered = self.lower_jsx_element(element);
                *expr = lowered;
            }
            Expression::JSXFragment(fragment) => {
                let lowered = self.lower_jsx_fragment(fragment);
                *expr = lowered;
            }
            _ => {
                walk_expression(self, expr);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEXT CLEANING
// ═══════════════════════════════════════════════════════════════════════════════

/// Collapse JSX text the way React toolchains do: lines are trimmed, lines that
/// are only whitespace disappear and the remaining lines are joined by a single
/// space. Returns `None` when nothing is left.
pub fn clean_jsx_text(raw: &str) -> Option<String> {
    let lines: Vec<&str> = raw.split('\n').collect();
    let last_non_empty = lines
        .iter()
        .rposition(|line| line.chars().any(|c| !c.is_whitespace()));

    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        let mut text: &str = line.trim_end_matches('\r');
        let is_first = i == 0;
        let is_last = i == lines.len() - 1;
        if !is_first {
            text = text.trim_start_matches([' ', '\t']);
        }
        if !is_last {
            text = text.trim_end_matches([' ', '\t']);
        }
        if text.is_empty() {
            continue;
        }
        out.push_str(&text.replace('\t', " "));
        if Some(i) != last_non_empty {
            out.push(' ');
        }
    }

    if out.is_empty() {
        None
    } else {
        Some(decode_entities(&out))
    }
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    ENTITY_RE
        .replace_all(text, |caps: &regex::Captures| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some('\u{a0}'),
                    "copy" => Some('\u{a9}'),
                    "hellip" => Some('\u{2026}'),
                    "mdash" => Some('\u{2014}'),
                    "ndash" => Some('\u{2013}'),
                    _ => None,
                }
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Span of the first JSX node, if any, for quick detection without lowering.
pub fn first_jsx_span(program: &Program<'_>) -> Option<Span> {
    use oxc_ast_visit::Visit;

    struct Detector {
        found: Option<Span>,
    }

    impl<'a> Visit<'a> for Detector {
        fn visit_jsx_element(&mut self, it: &JSXElement<'a>) {
            if self.found.is_none() {
                self.found = Some(it.span());
            }
        }

        fn visit_jsx_fragment(&mut self, it: &JSXFragment<'a>) {
            if self.found.is_none() {
                self.found = Some(it.span());
            }
        }
    }

    let mut detector = Detector { found: None };
    detector.visit_program(program);
    detector.found
}
