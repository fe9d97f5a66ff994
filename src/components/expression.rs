//! Band-math over stacked reads.
//!
//! An expression is a comma separated list of arithmetic blocks such as
//! `B04/B03, (B08-B04)/(B08+B04)`. Each block yields one output band labelled
//! with the block text. Operators: `+ - * / **`, unary minus, parentheses and
//! the functions `abs sqrt log exp`.

use itertools::Itertools;
use ndarray::{stack, Array2, Axis, Zip};

use super::image::{ImageData, PointData};
use crate::errors::{PdsError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl Op {
    fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Op::Add => lhs + rhs,
            Op::Sub => lhs - rhs,
            Op::Mul => lhs * rhs,
            Op::Div => lhs / rhs,
            Op::Pow => lhs.powf(rhs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Func {
    Abs,
    Sqrt,
    Log,
    Exp,
}

impl Func {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "abs" => Some(Func::Abs),
            "sqrt" => Some(Func::Sqrt),
            "log" => Some(Func::Log),
            "exp" => Some(Func::Exp),
            _ => None,
        }
    }

    fn apply(self, value: f64) -> f64 {
        match self {
            Func::Abs => value.abs(),
            Func::Sqrt => value.sqrt(),
            Func::Log => value.ln(),
            Func::Exp => value.exp(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Number(f64),
    Band(String),
    Neg(Box<Node>),
    Binary(Op, Box<Node>, Box<Node>),
    Call(Func, Box<Node>),
}

impl Node {
    fn bands<'a>(&'a self, found: &mut Vec<&'a str>) {
        match self {
            Node::Number(_) => (),
            Node::Band(name) => found.push(name),
            Node::Neg(inner) | Node::Call(_, inner) => inner.bands(found),
            Node::Binary(_, lhs, rhs) => {
                lhs.bands(found);
                rhs.bands(found);
            }
        }
    }

    fn rename(&mut self, rename: &impl Fn(&str) -> String) {
        match self {
            Node::Number(_) => (),
            Node::Band(name) => *name = rename(name),
            Node::Neg(inner) | Node::Call(_, inner) => inner.rename(rename),
            Node::Binary(_, lhs, rhs) => {
                lhs.rename(rename);
                rhs.rename(rename);
            }
        }
    }

    fn eval_array(&self, image: &ImageData) -> Result<Array2<f64>> {
        let shape = (image.height(), image.width());
        Ok(match self {
            Node::Number(value) => Array2::from_elem(shape, *value),
            Node::Band(name) => image
                .band(name)
                .ok_or_else(|| missing_band(name))?
                .to_owned(),
            Node::Neg(inner) => -inner.eval_array(image)?,
            Node::Call(func, inner) => inner.eval_array(image)?.mapv_into(|v| func.apply(v)),
            Node::Binary(op, lhs, rhs) => {
                let mut lhs = lhs.eval_array(image)?;
                let rhs = rhs.eval_array(image)?;
                Zip::from(&mut lhs)
                    .and(&rhs)
                    .for_each(|l, &r| *l = op.apply(*l, r));
                lhs
            }
        })
    }

    fn eval_value(&self, lookup: &impl Fn(&str) -> Option<f64>) -> Result<f64> {
        Ok(match self {
            Node::Number(value) => *value,
            Node::Band(name) => lookup(name).ok_or_else(|| missing_band(name))?,
            Node::Neg(inner) => -inner.eval_value(lookup)?,
            Node::Call(func, inner) => func.apply(inner.eval_value(lookup)?),
            Node::Binary(op, lhs, rhs) => op.apply(lhs.eval_value(lookup)?, rhs.eval_value(lookup)?),
        })
    }
}

fn missing_band(name: &str) -> PdsError {
    PdsError::Expression {
        expression: name.into(),
        reason: "band was not read".into(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(Op),
    Open,
    Close,
}

fn tokenize(block: &str) -> std::result::Result<Vec<Token>, String> {
    let chars = block.chars().collect_vec();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            '+' | '-' | '/' => {
                tokens.push(Token::Op(match c {
                    '+' => Op::Add,
                    '-' => Op::Sub,
                    _ => Op::Div,
                }));
                i += 1;
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Op(Op::Pow));
                i += 2;
            }
            '*' => {
                tokens.push(Token::Op(Op::Mul));
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text.parse().map_err(|_| format!("bad number {text}"))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            c => return Err(format!("unexpected character {c:?}")),
        }
    }
    Ok(tokens)
}

/// Recursive descent: sum := product (('+'|'-') product)*,
/// product := unary (('*'|'/') unary)*, unary := '-' unary | power,
/// power := atom ('**' unary)?
struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn sum(&mut self) -> std::result::Result<Node, String> {
        let mut node = self.product()?;
        while let Some(Token::Op(op @ (Op::Add | Op::Sub))) = self.peek().cloned() {
            self.position += 1;
            node = Node::Binary(op, Box::new(node), Box::new(self.product()?));
        }
        Ok(node)
    }

    fn product(&mut self) -> std::result::Result<Node, String> {
        let mut node = self.unary()?;
        while let Some(Token::Op(op @ (Op::Mul | Op::Div))) = self.peek().cloned() {
            self.position += 1;
            node = Node::Binary(op, Box::new(node), Box::new(self.unary()?));
        }
        Ok(node)
    }

    fn unary(&mut self) -> std::result::Result<Node, String> {
        match self.peek() {
            Some(Token::Op(Op::Sub)) => {
                self.position += 1;
                Ok(Node::Neg(Box::new(self.unary()?)))
            }
            Some(Token::Op(Op::Add)) => {
                self.position += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> std::result::Result<Node, String> {
        let base = self.atom()?;
        if let Some(Token::Op(Op::Pow)) = self.peek() {
            self.position += 1;
            return Ok(Node::Binary(Op::Pow, Box::new(base), Box::new(self.unary()?)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> std::result::Result<Node, String> {
        match self.next() {
            Some(Token::Number(value)) => Ok(Node::Number(value)),
            Some(Token::Open) => {
                let node = self.sum()?;
                self.close()?;
                Ok(node)
            }
            Some(Token::Ident(name)) => match Func::parse(&name) {
                Some(func) => {
                    if self.next() != Some(Token::Open) {
                        return Err(format!("{name} is a reserved function name"));
                    }
                    let node = self.sum()?;
                    self.close()?;
                    Ok(Node::Call(func, Box::new(node)))
                }
                None => Ok(Node::Band(name)),
            },
            Some(token) => Err(format!("unexpected {token:?}")),
            None => Err("unexpected end of expression".into()),
        }
    }

    fn close(&mut self) -> std::result::Result<(), String> {
        match self.next() {
            Some(Token::Close) => Ok(()),
            _ => Err("missing closing parenthesis".into()),
        }
    }
}

/// Parsed band-math expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    blocks: Vec<(String, Node)>,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self> {
        let invalid = |reason: String| PdsError::Expression {
            expression: source.into(),
            reason,
        };
        let blocks = source
            .split(',')
            .map(str::trim)
            .filter(|block| !block.is_empty())
            .map(|block| {
                let mut parser = Parser {
                    tokens: tokenize(block).map_err(invalid)?,
                    position: 0,
                };
                let node = parser.sum().map_err(invalid)?;
                if let Some(token) = parser.peek() {
                    return Err(invalid(format!("unexpected {token:?}")));
                }
                Ok((block.to_string(), node))
            })
            .collect::<Result<Vec<_>>>()?;
        if blocks.is_empty() {
            return Err(PdsError::MissingBands);
        }
        Ok(Self { blocks })
    }

    /// Output band names: the literal text of every block.
    pub fn labels(&self) -> Vec<String> {
        self.blocks.iter().map(|(label, _)| label.clone()).collect()
    }

    /// Referenced band names, first appearance first, without duplicates.
    pub fn bands(&self) -> Vec<String> {
        let mut found = Vec::new();
        for (_, node) in &self.blocks {
            node.bands(&mut found);
        }
        found.into_iter().unique().map(String::from).collect()
    }

    /// Rewrite every band reference, keeping the block labels.
    pub fn rename_bands(mut self, rename: impl Fn(&str) -> String) -> Self {
        for (_, node) in self.blocks.iter_mut() {
            node.rename(&rename);
        }
        self
    }

    pub fn evaluate(&self, image: &ImageData) -> Result<ImageData> {
        let outputs = self
            .blocks
            .iter()
            .map(|(_, node)| node.eval_array(image))
            .collect::<Result<Vec<_>>>()?;
        let views = outputs.iter().map(|output| output.view()).collect_vec();
        let array = stack(Axis(0), &views)?;
        let mut evaluated = ImageData::new(array, image.mask.clone(), self.labels())?
            .with_assets(image.assets.clone());
        evaluated.bounds = image.bounds;
        Ok(evaluated)
    }

    pub fn evaluate_point(&self, point: &PointData) -> Result<PointData> {
        let lookup = |name: &str| {
            point
                .band_names
                .iter()
                .position(|band| band == name)
                .map(|index| point.values[index])
        };
        let values = self
            .blocks
            .iter()
            .map(|(_, node)| node.eval_value(&lookup))
            .collect::<Result<Vec<_>>>()?;
        let valid = point.is_full();
        let mask = vec![valid; values.len()];
        Ok(PointData::new(values, mask, self.labels(), point.coordinates)?.with_assets(point.assets.clone()))
    }
}
