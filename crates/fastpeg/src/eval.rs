use cranelift_entity::PrimaryMap;
use fastpeg_runtime::{Captures, PseudoToken, Reader, Token, Value};

use crate::{
    action::ActionCx,
    error::NoMatch,
    expr::Expr,
    grammar::{RuleBody, RuleDef, RuleHandle},
};

pub(crate) type EvalResult<'g> = Result<Value, NoMatch<'g>>;

/// Recursive descent over the expression tree.
///
/// The reader is the only mutable parse state besides the capture scope of the current
/// frame, combinators that can backtrack snapshot the reader themselves.
#[derive(Clone, Copy)]
pub(crate) struct Evaluator<'g> {
    rules: Option<&'g PrimaryMap<RuleHandle, RuleDef>>,
}

impl<'g> Evaluator<'g> {
    /// An evaluator for expressions that don't reference any rules.
    pub fn standalone() -> Evaluator<'g> {
        Evaluator { rules: None }
    }
    pub fn new(rules: &'g PrimaryMap<RuleHandle, RuleDef>) -> Evaluator<'g> {
        Evaluator { rules: Some(rules) }
    }

    pub fn eval_root(self, expr: &'g Expr, reader: &mut Reader<'_>) -> EvalResult<'g> {
        let mut scope = Captures::new();
        self.eval(expr, reader, &mut scope)
    }

    pub fn call_rule(self, handle: RuleHandle, reader: &mut Reader<'_>) -> EvalResult<'g> {
        let Some(rules) = self.rules else {
            panic!("Rule {handle:?} called without a rule set");
        };
        let rule = &rules[handle];
        let start = reader.pos();
        log::trace!("enter `{}` at {}", rule.name, start);

        // the callee never sees the caller's labels
        let mut scope = Captures::new();
        let result = match &rule.body {
            RuleBody::Expr(expr) => self.eval(expr, reader, &mut scope),
            RuleBody::Precedence(levels) => match levels.first() {
                Some(&first) => self.call_rule(first, reader),
                None => unreachable!("Precedence rule `{}` has no levels", rule.name),
            },
            RuleBody::Level { ops, operand } => self.eval_level(handle, ops, *operand, reader),
        };

        match &result {
            Ok(_) => log::trace!("`{}` matched {}..{}", rule.name, start, reader.pos()),
            Err(err) => log::trace!("`{}` failed at {}", rule.name, err.pos),
        }
        result
    }

    pub fn eval(
        self,
        expr: &'g Expr,
        reader: &mut Reader<'_>,
        scope: &mut Captures,
    ) -> EvalResult<'g> {
        let start = reader.pos();
        match expr {
            Expr::Literal(lit) => match reader.consume(lit.bytes(), lit.ignore_case()) {
                Some(token) => Ok(Value::Token(token)),
                None => Err(NoMatch::new(expr, start)),
            },
            Expr::CharRange(range) => match reader.peek_char() {
                Some(ch) if range.contains(ch) => {
                    reader.next_char();
                    Ok(Value::Token(reader.token_since(start)))
                }
                _ => Err(NoMatch::new(expr, start)),
            },
            Expr::AnyChar => match reader.next_char() {
                Some(_) => Ok(Value::Token(reader.token_since(start))),
                None => Err(NoMatch::new(expr, start)),
            },
            Expr::Seq(exprs) => {
                let mut values = Vec::with_capacity(exprs.len());
                for e in exprs {
                    let value = self.eval(e, reader, scope)?;
                    if !matches!(e, Expr::Discard(_)) {
                        values.push(value);
                    }
                }
                Ok(Value::List(values))
            }
            Expr::Choice(exprs) => {
                let mut failure = None;
                for e in exprs {
                    let saved = reader.save_position();
                    match self.eval(e, reader, scope) {
                        Ok(value) => return Ok(value),
                        Err(err) => {
                            reader.restore_position(saved);
                            err.merge_into(&mut failure);
                        }
                    }
                }
                Err(failure.unwrap_or(NoMatch::new(expr, start)))
            }
            Expr::Repeat(e) => Ok(self.repeat(e, reader, scope, Vec::new())),
            Expr::OneOrMore(e) => {
                let first = self.eval(e, reader, scope)?;
                if reader.pos() == start {
                    warn_zero_width(e, start);
                    return Ok(Value::List(vec![first]));
                }
                Ok(self.repeat(e, reader, scope, vec![first]))
            }
            Expr::Optional(e) => {
                let saved = reader.save_position();
                match self.eval(e, reader, scope) {
                    Ok(value) => Ok(value),
                    Err(_) => {
                        reader.restore_position(saved);
                        Ok(Value::Token(Token::empty(start)))
                    }
                }
            }
            Expr::LookAhead(e) => {
                let saved = reader.save_position();
                let result = self.eval(e, reader, scope);
                reader.restore_position(saved);
                result.map(|_| Value::Token(Token::empty(start)))
            }
            Expr::Not(e) => {
                let saved = reader.save_position();
                let result = self.eval(e, reader, scope);
                reader.restore_position(saved);
                match result {
                    Ok(_) => Err(NoMatch::new(expr, start)),
                    Err(_) => Ok(Value::Token(Token::empty(start))),
                }
            }
            Expr::Discard(e) => self.eval(e, reader, scope),
            Expr::Label(name, e) => {
                let value = self.eval(e, reader, scope)?;
                scope.insert(name.clone(), value.clone());
                Ok(value)
            }
            Expr::Action(e, action) => {
                let mut inner = scope.clone();
                let value = self.eval(e, reader, &mut inner)?;
                let cx = ActionCx::new(reader.input(), &inner);
                Ok(action.call(&cx, value))
            }
            Expr::Slice(e) => {
                let value = self.eval(e, reader, scope)?;
                let mut spans = value.flatten().into_iter().filter_map(|v| v.span());
                let token = match spans.next() {
                    Some(first) => {
                        let last = spans.last().unwrap_or(first);
                        Token::new(first.start(), last.end())
                    }
                    None => Token::empty(start),
                };
                Ok(Value::Token(token))
            }
            Expr::Concat(e) => {
                let value = self.eval(e, reader, scope)?;
                let content = value.bytes(reader.input()).into_owned();
                Ok(Value::Pseudo(PseudoToken::new(start, reader.pos(), content)))
            }
            Expr::Rule(rule) => match rule.handle() {
                Some(handle) => self.call_rule(handle, reader),
                None => panic!("Rule `{}` was never resolved", rule.name()),
            },
        }
    }

    /// Greedy loop, stops at the first failure or at an iteration that consumed nothing.
    fn repeat(
        self,
        body: &'g Expr,
        reader: &mut Reader<'_>,
        scope: &mut Captures,
        mut values: Vec<Value>,
    ) -> Value {
        loop {
            let saved = reader.save_position();
            match self.eval(body, reader, scope) {
                Ok(value) => {
                    values.push(value);
                    if reader.pos() == saved.get() {
                        warn_zero_width(body, saved.get());
                        break;
                    }
                }
                Err(_) => {
                    reader.restore_position(saved);
                    break;
                }
            }
        }
        Value::List(values)
    }
}

fn warn_zero_width(body: &Expr, pos: usize) {
    log::warn!("`{body}` matched without consuming input at {pos}, ending repetition");
}
