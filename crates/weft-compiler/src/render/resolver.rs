//! The default resolver: built-in helpers plus user registration.

use std::cell::RefCell;

use itertools::Itertools;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::error::RenderError;
use crate::render::{ContentCall, Programs, Resolver, Scope, render_template};
use crate::value::Value;
use weft_dom::Dom;

/// Evaluated arguments handed to a registered helper.
pub struct HelperArgs<'a> {
    pub params: &'a [Value],
    pub hash: &'a [(SmolStr, Value)],
}

impl HelperArgs<'_> {
    /// The `index`th positional argument, `Nil` when absent.
    pub fn param(&self, index: usize) -> Value {
        self.params.get(index).cloned().unwrap_or_default()
    }

    /// The named argument `key`, `Nil` when absent.
    pub fn named(&self, key: &str) -> Value {
        self.hash
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.clone())
            .unwrap_or_default()
    }
}

type HelperFn = Box<dyn Fn(&HelperArgs<'_>) -> Result<Value, RenderError>>;
type ElementHelperFn<D> = Box<dyn Fn(&D, &<D as Dom>::Node, &HelperArgs<'_>) -> Result<(), RenderError>>;

/// A [`Resolver`] with the built-in helpers (`if`, `unless`, `each`, `with`,
/// `log`) and registries for user-defined value and element helpers.
///
/// `log` output is captured into an internal buffer rather than printed, so
/// embedders decide where it goes.
pub struct DefaultResolver<D: Dom> {
    helpers: FxHashMap<SmolStr, HelperFn>,
    element_helpers: FxHashMap<SmolStr, ElementHelperFn<D>>,
    logs: RefCell<Vec<String>>,
}

impl<D: Dom> Default for DefaultResolver<D> {
    fn default() -> Self {
        DefaultResolver {
            helpers: FxHashMap::default(),
            element_helpers: FxHashMap::default(),
            logs: RefCell::new(Vec::new()),
        }
    }
}

impl<D: Dom> DefaultResolver<D> {
    pub fn new() -> Self {
        DefaultResolver::default()
    }

    /// Registers a value helper under `name`.
    pub fn register_helper(
        &mut self,
        name: impl Into<SmolStr>,
        helper: impl Fn(&HelperArgs<'_>) -> Result<Value, RenderError> + 'static,
    ) {
        self.helpers.insert(name.into(), Box::new(helper));
    }

    /// Registers an element helper under `name`.
    pub fn register_element_helper(
        &mut self,
        name: impl Into<SmolStr>,
        helper: impl Fn(&D, &D::Node, &HelperArgs<'_>) -> Result<(), RenderError> + 'static,
    ) {
        self.element_helpers.insert(name.into(), Box::new(helper));
    }

    pub fn has_helper(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    /// Everything `log` captured so far, in invocation order.
    pub fn logs(&self) -> Vec<String> {
        self.logs.borrow().clone()
    }

    fn fill(&self, dom: &D, placeholder: &D::Node, value: &Value, escaped: bool) {
        let rendered = value.to_string();
        let node = if escaped {
            dom.create_text(&rendered)
        } else {
            dom.create_raw(&rendered)
        };
        dom.replace_with(placeholder, &node);
    }

    fn clear(&self, dom: &D, placeholder: &D::Node) {
        dom.replace_with(placeholder, &dom.create_text(""));
    }

    fn render_branch(
        &self,
        dom: &D,
        scope: &Scope,
        placeholder: &D::Node,
        branch: Option<&crate::template::CompiledTemplate<D>>,
    ) -> Result<(), RenderError> {
        match branch {
            Some(template) => {
                let fragment = render_template(template, dom, scope, self)?;
                dom.replace_with(placeholder, &fragment);
            }
            None => self.clear(dom, placeholder),
        }
        Ok(())
    }

    fn block_form<'a>(
        name: &SmolStr,
        programs: &Programs<'a, D>,
    ) -> Result<&'a crate::template::CompiledTemplate<D>, RenderError> {
        programs.primary.ok_or_else(|| RenderError::InvalidArguments {
            name: name.clone(),
            message: "block form required".to_string(),
        })
    }

    fn conditional(
        &self,
        dom: &D,
        scope: &Scope,
        placeholder: &D::Node,
        name: &SmolStr,
        params: &[Value],
        programs: Programs<'_, D>,
        invert: bool,
    ) -> Result<(), RenderError> {
        let primary = Self::block_form(name, &programs)?;
        let condition = params.first().ok_or_else(|| RenderError::InvalidArguments {
            name: name.clone(),
            message: "expected one argument".to_string(),
        })?;

        if condition.is_truthy() != invert {
            self.render_branch(dom, scope, placeholder, Some(primary))
        } else {
            self.render_branch(dom, scope, placeholder, programs.inverse)
        }
    }

    fn each(
        &self,
        dom: &D,
        scope: &Scope,
        placeholder: &D::Node,
        name: &SmolStr,
        params: &[Value],
        programs: Programs<'_, D>,
    ) -> Result<(), RenderError> {
        let primary = Self::block_form(name, &programs)?;
        let items = match params.first() {
            Some(Value::List(items)) if !items.is_empty() => items.clone(),
            _ => return self.render_branch(dom, scope, placeholder, programs.inverse),
        };

        let out = dom.create_fragment();
        let block_params = primary.block_params();
        for (index, item) in items.iter().enumerate() {
            let item_scope = match block_params.first() {
                Some(local) => scope.with_local(local.clone(), item.clone()),
                None => scope.child(item.clone()),
            };
            let item_scope = match block_params.get(1) {
                Some(local) => item_scope.with_local(local.clone(), Value::Number(index as f64)),
                None => item_scope,
            };
            let fragment = render_template(primary, dom, &item_scope, self)?;
            dom.append_child(&out, &fragment);
        }
        dom.replace_with(placeholder, &out);
        Ok(())
    }

    fn with(
        &self,
        dom: &D,
        scope: &Scope,
        placeholder: &D::Node,
        name: &SmolStr,
        params: &[Value],
        programs: Programs<'_, D>,
    ) -> Result<(), RenderError> {
        let primary = Self::block_form(name, &programs)?;
        let value = params.first().cloned().unwrap_or_default();
        if !value.is_truthy() {
            return self.render_branch(dom, scope, placeholder, programs.inverse);
        }

        let inner = match primary.block_params().first() {
            Some(local) => scope.with_local(local.clone(), value),
            None => scope.child(value),
        };
        self.render_branch(dom, &inner, placeholder, Some(primary))
    }

    fn log(&self, dom: &D, placeholder: &D::Node, params: &[Value]) {
        let line = params.iter().map(ToString::to_string).join(" ");
        self.logs.borrow_mut().push(line);
        self.clear(dom, placeholder);
    }

    /// A registered or unknown helper in content position. An unknown name
    /// in block form falls back to a property read: truthy renders the
    /// primary branch with the value as context, falsy the inverse.
    fn user_helper(
        &self,
        dom: &D,
        scope: &Scope,
        placeholder: &D::Node,
        name: &SmolStr,
        params: &[Value],
        hash: &[(SmolStr, Value)],
        escaped: bool,
        programs: Programs<'_, D>,
    ) -> Result<(), RenderError> {
        let value = match self.helpers.get(name) {
            Some(helper) => helper(&HelperArgs { params, hash })?,
            None if programs.is_block() => scope.lookup(&crate::ast::Path::parse(name)),
            None => return Err(RenderError::UnknownHelper(name.clone())),
        };

        if !programs.is_block() {
            self.fill(dom, placeholder, &value, escaped);
            return Ok(());
        }
        if value.is_truthy() {
            let primary = Self::block_form(name, &programs)?;
            self.render_branch(dom, &scope.child(value), placeholder, Some(primary))
        } else {
            self.render_branch(dom, scope, placeholder, programs.inverse)
        }
    }
}

impl<D: Dom> Resolver<D> for DefaultResolver<D> {
    fn subexpr(
        &self,
        _dom: &D,
        _scope: &Scope,
        name: &SmolStr,
        params: Vec<Value>,
        hash: Vec<(SmolStr, Value)>,
    ) -> Result<Value, RenderError> {
        let helper = self
            .helpers
            .get(name)
            .ok_or_else(|| RenderError::UnknownHelper(name.clone()))?;
        helper(&HelperArgs {
            params: &params,
            hash: &hash,
        })
    }

    fn content(
        &self,
        dom: &D,
        scope: &Scope,
        placeholder: &D::Node,
        call: ContentCall<'_, D>,
    ) -> Result<(), RenderError> {
        match call {
            ContentCall::Ambiguous { path, escaped } => {
                // The zero-arg ambiguity resolves here: a registered helper
                // wins over a context property of the same name.
                let value = match path.is_simple().then(|| self.helpers.get(&path.name())).flatten() {
                    Some(helper) => helper(&HelperArgs { params: &[], hash: &[] })?,
                    None => scope.lookup(path),
                };
                self.fill(dom, placeholder, &value, escaped);
                Ok(())
            }
            ContentCall::Helper {
                name,
                params,
                hash,
                escaped,
                programs,
            } => match name.as_str() {
                "if" => self.conditional(dom, scope, placeholder, name, &params, programs, false),
                "unless" => self.conditional(dom, scope, placeholder, name, &params, programs, true),
                "each" => self.each(dom, scope, placeholder, name, &params, programs),
                "with" => self.with(dom, scope, placeholder, name, &params, programs),
                "log" => {
                    self.log(dom, placeholder, &params);
                    Ok(())
                }
                _ => self.user_helper(dom, scope, placeholder, name, &params, &hash, escaped, programs),
            },
        }
    }

    fn attribute(
        &self,
        dom: &D,
        _scope: &Scope,
        element: &D::Node,
        name: &SmolStr,
        parts: Vec<Value>,
    ) -> Result<(), RenderError> {
        let value: String = parts.iter().map(ToString::to_string).collect();
        dom.set_attribute(element, name, &value);
        Ok(())
    }

    fn element(
        &self,
        dom: &D,
        _scope: &Scope,
        element: &D::Node,
        name: &SmolStr,
        params: Vec<Value>,
        hash: Vec<(SmolStr, Value)>,
    ) -> Result<(), RenderError> {
        let helper = self
            .element_helpers
            .get(name)
            .ok_or_else(|| RenderError::UnknownHelper(name.clone()))?;
        helper(dom, element, &HelperArgs {
            params: &params,
            hash: &hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AttrPart, Attribute, Block, Element, Mustache, Node, Param};
    use crate::compiler::TemplateCompiler;
    use crate::template::CompiledTemplate;
    use rstest::rstest;
    use weft_dom::{TreeDom, to_html};

    fn compile(program: &[Node]) -> CompiledTemplate<TreeDom> {
        TemplateCompiler::new().compile(program).unwrap()
    }

    fn render(program: &[Node], context: Value) -> String {
        render_with(program, context, DefaultResolver::new())
    }

    fn render_with(program: &[Node], context: Value, resolver: DefaultResolver<TreeDom>) -> String {
        let template = compile(program);
        let dom = TreeDom::new();
        let out = template.render(&dom, &context, &resolver).unwrap();
        to_html(&out)
    }

    #[rstest]
    fn test_escaped_and_raw_output() {
        let program = vec![
            Node::mustache("safe"),
            Node::from(Mustache::path("markup").unescaped()),
        ];
        let context = Value::map([
            ("safe", "<b>".into()),
            ("markup", "<b>bold</b>".into()),
        ]);
        assert_eq!(render(&program, context), "&lt;b&gt;<b>bold</b>");
    }

    #[rstest]
    #[case(true, "<b>Yes</b>")]
    #[case(false, "<i>No</i>")]
    fn test_if_else(#[case] cond: bool, #[case] expected: &str) {
        let program = vec![
            Block::new(
                Mustache::path("if").param(Param::path("cond")),
                vec![Element::new("b").child(Node::text("Yes")).into()],
            )
            .with_inverse(vec![Element::new("i").child(Node::text("No")).into()])
            .into(),
        ];
        assert_eq!(
            render(&program, Value::map([("cond", cond.into())])),
            expected
        );
    }

    #[rstest]
    fn test_if_without_inverse_renders_nothing_when_falsy() {
        let program = vec![
            Block::new(
                Mustache::path("if").param(Param::path("cond")),
                vec![Node::text("shown")],
            )
            .into(),
        ];
        assert_eq!(render(&program, Value::map([("cond", false.into())])), "");
    }

    #[rstest]
    fn test_unless_inverts() {
        let program = vec![
            Block::new(
                Mustache::path("unless").param(Param::path("done")),
                vec![Node::text("pending")],
            )
            .into(),
        ];
        assert_eq!(
            render(&program, Value::map([("done", false.into())])),
            "pending"
        );
    }

    #[rstest]
    fn test_each_switches_context_per_item() {
        let program = vec![
            Block::new(
                Mustache::path("each").param(Param::path("names")),
                vec![
                    Element::new("li").child(Node::mustache("this")).into(),
                ],
            )
            .into(),
        ];
        let context = Value::map([(
            "names",
            Value::list(["a".into(), "b".into(), "c".into()]),
        )]);
        assert_eq!(render(&program, context), "<li>a</li><li>b</li><li>c</li>");
    }

    #[rstest]
    fn test_each_with_block_params_keeps_outer_context() {
        let program = vec![
            Block::new(
                Mustache::path("each").param(Param::path("items")),
                vec![
                    Node::mustache("idx"),
                    Node::text(":"),
                    Node::mustache("item"),
                    Node::text(":"),
                    Node::mustache("title"),
                    Node::text(" "),
                ],
            )
            .with_block_params(["item", "idx"])
            .into(),
        ];
        let context = Value::map([
            ("title", "T".into()),
            ("items", Value::list(["x".into(), "y".into()])),
        ]);
        assert_eq!(render(&program, context), "0:x:T 1:y:T ");
    }

    #[rstest]
    fn test_each_empty_list_takes_inverse() {
        let program = vec![
            Block::new(
                Mustache::path("each").param(Param::path("items")),
                vec![Node::mustache("this")],
            )
            .with_inverse(vec![Node::text("none")])
            .into(),
        ];
        assert_eq!(
            render(&program, Value::map([("items", Value::List(vec![]))])),
            "none"
        );
    }

    #[rstest]
    fn test_with_narrows_context() {
        let program = vec![
            Block::new(
                Mustache::path("with").param(Param::path("user")),
                vec![Node::mustache("name")],
            )
            .into(),
        ];
        let context = Value::map([("user", Value::map([("name", "Ada".into())]))]);
        assert_eq!(render(&program, context), "Ada");
    }

    #[rstest]
    fn test_log_captures_instead_of_rendering() {
        let program = vec![
            Node::text("a"),
            Node::from(
                Mustache::path("log")
                    .param(Param::string("value is"))
                    .param(Param::path("x")),
            ),
            Node::text("b"),
        ];
        let template = compile(&program);
        let dom = TreeDom::new();
        let resolver = DefaultResolver::new();
        let out = template
            .render(&dom, &Value::map([("x", 7.into())]), &resolver)
            .unwrap();
        assert_eq!(to_html(&out), "ab");
        assert_eq!(resolver.logs(), vec!["value is 7".to_string()]);
    }

    #[rstest]
    fn test_registered_helper_in_content_position() {
        let mut resolver = DefaultResolver::new();
        resolver.register_helper("shout", |args: &HelperArgs<'_>| {
            Ok(Value::from(args.param(0).to_string().to_uppercase()))
        });
        let program = vec![Node::from(
            Mustache::path("shout").param(Param::path("name")),
        )];
        assert_eq!(
            render_with(&program, Value::map([("name", "ada".into())]), resolver),
            "ADA"
        );
    }

    #[rstest]
    fn test_registered_helper_wins_zero_arg_ambiguity() {
        let mut resolver = DefaultResolver::new();
        resolver.register_helper("today", |_: &HelperArgs<'_>| Ok(Value::from("helper")));
        let program = vec![Node::mustache("today")];
        // The context carries the same name; the helper shadows it.
        assert_eq!(
            render_with(&program, Value::map([("today", "property".into())]), resolver),
            "helper"
        );
    }

    #[rstest]
    fn test_unregistered_zero_arg_is_property_read() {
        let program = vec![Node::mustache("today")];
        assert_eq!(
            render(&program, Value::map([("today", "property".into())])),
            "property"
        );
    }

    #[rstest]
    fn test_unknown_helper_with_args_is_an_error() {
        let program = vec![Node::from(
            Mustache::path("missing").param(Param::path("x")),
        )];
        let template = compile(&program);
        let dom = TreeDom::new();
        let err = template
            .render(&dom, &Value::Nil, &DefaultResolver::new())
            .unwrap_err();
        assert_eq!(err, RenderError::UnknownHelper("missing".into()));
    }

    #[rstest]
    fn test_unknown_block_name_falls_back_to_property() {
        let program = vec![
            Block::new(
                Mustache::path("person"),
                vec![Node::mustache("name")],
            )
            .with_inverse(vec![Node::text("nobody")])
            .into(),
        ];
        let present = Value::map([("person", Value::map([("name", "Ada".into())]))]);
        assert_eq!(render(&program, present), "Ada");
        assert_eq!(render(&program, Value::map([("person", Value::Nil)])), "nobody");
    }

    #[rstest]
    fn test_subexpression_feeds_outer_helper() {
        let mut resolver = DefaultResolver::new();
        resolver.register_helper("concat", |args: &HelperArgs<'_>| {
            Ok(Value::from(format!("{}{}", args.param(0), args.param(1))))
        });
        resolver.register_helper("shout", |args: &HelperArgs<'_>| {
            Ok(Value::from(args.param(0).to_string().to_uppercase()))
        });
        let program = vec![Node::from(Mustache::path("shout").param(Param::SubExpr(
            Box::new(
                Mustache::path("concat")
                    .param(Param::path("a"))
                    .param(Param::path("b")),
            ),
        )))];
        let context = Value::map([("a", "he".into()), ("b", "llo".into())]);
        assert_eq!(render_with(&program, context, resolver), "HELLO");
    }

    #[rstest]
    fn test_dynamic_attribute_concatenates_parts() {
        let program = vec![
            Element::new("a")
                .attr(Attribute::new(
                    "href",
                    vec![
                        AttrPart::Text("/users/".into()),
                        AttrPart::Mustache(Mustache::path("id")),
                    ],
                ))
                .child(Node::mustache("name"))
                .into(),
        ];
        let context = Value::map([("id", 42.into()), ("name", "Ada".into())]);
        assert_eq!(render(&program, context), "<a href=\"/users/42\">Ada</a>");
    }

    #[rstest]
    fn test_element_helper_receives_element_node() {
        let mut resolver = DefaultResolver::new();
        resolver.register_element_helper(
            "bind-role",
            |dom: &TreeDom, element: &weft_dom::NodeHandle, args: &HelperArgs<'_>| {
                dom.set_attribute(element, "role", &args.param(0).to_string());
                Ok(())
            },
        );
        let program = vec![
            Element::new("div")
                .modifier(Mustache::path("bind-role").param(Param::string("banner")))
                .into(),
        ];
        assert_eq!(
            render_with(&program, Value::Nil, resolver),
            "<div role=\"banner\"></div>"
        );
    }

    #[rstest]
    fn test_named_arguments_reach_helpers() {
        let mut resolver = DefaultResolver::new();
        resolver.register_helper("repeat", |args: &HelperArgs<'_>| {
            let times = match args.named("times") {
                Value::Number(n) => n as usize,
                _ => 1,
            };
            Ok(Value::from(args.param(0).to_string().repeat(times)))
        });
        let program = vec![Node::from(
            Mustache::path("repeat")
                .param(Param::string("ab"))
                .pair("times", Param::number(3.0)),
        )];
        assert_eq!(render_with(&program, Value::Nil, resolver), "ababab");
    }

    #[rstest]
    fn test_nested_blocks() {
        let program = vec![
            Block::new(
                Mustache::path("each").param(Param::path("rows")),
                vec![
                    Block::new(
                        Mustache::path("if").param(Param::path("this.on")),
                        vec![Node::text("+")],
                    )
                    .with_inverse(vec![Node::text("-")])
                    .into(),
                ],
            )
            .into(),
        ];
        let context = Value::map([(
            "rows",
            Value::list([
                Value::map([("on", true.into())]),
                Value::map([("on", false.into())]),
                Value::map([("on", true.into())]),
            ]),
        )]);
        assert_eq!(render(&program, context), "+-+");
    }
}
