//! Heuristic extraction of wallet facts (address, tDUST balance, coins)
//! from semi-structured state payloads whose shape varies across wallet
//! SDK builds.

use mndust_types::{Coin, DustError, DustResult, NATIVE_TOKEN_ID, SHIELD_ADDRESS_PREFIX, TDUST_TAGS};
use serde_json::Value;
use std::collections::HashSet;

pub type NodeId = usize;

/// One node of a state graph. Numbers keep their decimal literal so
/// balances never round-trip through floating point.
#[derive(Clone, Debug)]
pub enum Node {
    Null,
    Bool(bool),
    Number(String),
    String(String),
    Array(Vec<NodeId>),
    Object(Vec<(String, NodeId)>),
}

/// Index-based snapshot of a wallet state tree. Children are referenced
/// by id, so graphs with shared or even cyclic structure are
/// representable and every traversal below carries a visited set.
#[derive(Clone, Debug)]
pub struct StateGraph {
    nodes: Vec<Node>,
    root: NodeId,
}

impl StateGraph {
    pub fn from_value(v: &Value) -> Self {
        let mut nodes = Vec::new();
        let root = build_node(&mut nodes, v);
        Self { nodes, root }
    }

    /// Build from a state snapshot, unwrapping the `state` envelope some
    /// SDK builds put around the payload.
    pub fn from_snapshot(v: &Value) -> Self {
        let root = v.get("state").filter(|s| s.is_object()).unwrap_or(v);
        Self::from_value(root)
    }

    pub fn from_json(text: &str) -> DustResult<Self> {
        let v: Value =
            serde_json::from_str(text).map_err(|e| DustError::Serialization(e.to_string()))?;
        Ok(Self::from_snapshot(&v))
    }

    /// Assemble from raw parts. Ids may reference any node, including
    /// ancestors, which is how cyclic provider state is modeled.
    pub fn from_parts(nodes: Vec<Node>, root: NodeId) -> DustResult<Self> {
        let bound = nodes.len();
        let check = |id: NodeId| -> DustResult<()> {
            if id < bound {
                Ok(())
            } else {
                Err(DustError::Internal(format!(
                    "state graph node id {} out of bounds ({} nodes)",
                    id, bound
                )))
            }
        };
        check(root)?;
        for node in &nodes {
            match node {
                Node::Array(items) => {
                    for &id in items {
                        check(id)?;
                    }
                }
                Node::Object(fields) => {
                    for (_, id) in fields {
                        check(*id)?;
                    }
                }
                _ => {}
            }
        }
        Ok(Self { nodes, root })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    fn field(&self, id: NodeId, key: &str) -> Option<NodeId> {
        match self.node(id) {
            Node::Object(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| *v),
            _ => None,
        }
    }

    fn string_at(&self, id: NodeId) -> Option<&str> {
        match self.node(id) {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    /// Decimal literal at a node: number literals verbatim, strings when
    /// they look numeric. Never a float conversion.
    fn decimal_at(&self, id: NodeId) -> Option<String> {
        match self.node(id) {
            Node::Number(lit) => Some(lit.clone()),
            Node::String(s) => {
                let t = s.trim();
                if !t.is_empty() && t.chars().all(|c| c.is_ascii_digit() || c == '.') {
                    Some(t.to_string())
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn u128_at(&self, id: NodeId) -> Option<u128> {
        let lit = self.decimal_at(id)?;
        lit.parse::<u128>().ok()
    }

    fn u64_at(&self, id: NodeId) -> Option<u64> {
        let lit = self.decimal_at(id)?;
        lit.parse::<u64>().ok()
    }

    /// Render back to JSON text for last-resort pattern scans. Revisited
    /// nodes are emitted as null, so cyclic graphs terminate.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let mut seen = HashSet::new();
        self.write_node(self.root, &mut seen, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, seen: &mut HashSet<NodeId>, out: &mut String) {
        match self.node(id) {
            Node::Null => out.push_str("null"),
            Node::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Node::Number(lit) => out.push_str(lit),
            Node::String(s) => {
                out.push_str(&Value::String(s.clone()).to_string());
            }
            Node::Array(items) => {
                if !seen.insert(id) {
                    out.push_str("null");
                    return;
                }
                out.push('[');
                for (i, &item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    self.write_node(item, seen, out);
                }
                out.push(']');
            }
            Node::Object(fields) => {
                if !seen.insert(id) {
                    out.push_str("null");
                    return;
                }
                out.push('{');
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&Value::String(key.clone()).to_string());
                    out.push(':');
                    self.write_node(*value, seen, out);
                }
                out.push('}');
            }
        }
    }
}

fn build_node(nodes: &mut Vec<Node>, v: &Value) -> NodeId {
    let node = match v {
        Value::Null => Node::Null,
        Value::Bool(b) => Node::Bool(*b),
        Value::Number(n) => Node::Number(n.to_string()),
        Value::String(s) => Node::String(s.clone()),
        Value::Array(items) => {
            let ids = items.iter().map(|item| build_node(nodes, item)).collect();
            Node::Array(ids)
        }
        Value::Object(fields) => {
            let ids = fields
                .iter()
                .map(|(k, val)| (k.clone(), build_node(nodes, val)))
                .collect();
            Node::Object(ids)
        }
    };
    nodes.push(node);
    nodes.len() - 1
}

const ADDRESS_FIELDS: [&str; 3] = ["address", "shieldAddress", "receivingAddress"];
const ADDRESS_PATHS: [[&str; 2]; 2] = [["account", "address"], ["wallet", "address"]];
const ADDRESS_ARRAYS: [&str; 3] = ["addresses", "accounts", "wallets"];

const BALANCE_ARRAYS: [&str; 3] = ["assets", "balances", "coins"];
const BALANCE_TAG_FIELDS: [&str; 5] = ["asset", "ticker", "symbol", "denom", "unit"];
const BALANCE_VALUE_FIELDS: [&str; 3] = ["amount", "balance", "quantity"];

const COIN_TYPE_FIELDS: [&str; 6] = ["type", "token", "tokenType", "token_type", "color", "asset"];
const COIN_NONCE_FIELDS: [&str; 3] = ["nonce", "randomness", "rand"];
const COIN_VALUE_FIELDS: [&str; 4] = ["value", "amount", "balance", "quantity"];
const COIN_POSITION_FIELDS: [&str; 7] = [
    "mt_index",
    "mtIndex",
    "merkleIndex",
    "position",
    "index",
    "treeIndex",
    "idx",
];

/// A mined address with the heuristic that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MinedAddress {
    pub address: String,
    pub via: &'static str,
}

/// Extract a shield address. Heuristics run in priority order and
/// short-circuit on the first hit; the input graph is never mutated.
pub fn mine_address(g: &StateGraph) -> Option<MinedAddress> {
    if let Some(addr) = address_direct(g) {
        return Some(MinedAddress { address: addr, via: "direct-field" });
    }
    if let Some(addr) = address_known_arrays(g) {
        return Some(MinedAddress { address: addr, via: "known-array" });
    }
    if let Some(addr) = address_deep_scan(g) {
        return Some(MinedAddress { address: addr, via: "deep-scan" });
    }
    scan_text_for_address(&g.to_text()).map(|addr| MinedAddress { address: addr, via: "text-scan" })
}

fn is_shield_address(s: &str) -> bool {
    s.starts_with(SHIELD_ADDRESS_PREFIX)
}

fn address_direct(g: &StateGraph) -> Option<String> {
    let root = g.root();
    for field in ADDRESS_FIELDS {
        if let Some(s) = g.field(root, field).and_then(|id| g.string_at(id)) {
            if is_shield_address(s) {
                return Some(s.to_string());
            }
        }
    }
    for path in ADDRESS_PATHS {
        let id = g.field(root, path[0]).and_then(|id| g.field(id, path[1]));
        if let Some(s) = id.and_then(|id| g.string_at(id)) {
            if is_shield_address(s) {
                return Some(s.to_string());
            }
        }
    }
    None
}

fn address_in_entry(g: &StateGraph, id: NodeId) -> Option<String> {
    if let Some(s) = g.string_at(id) {
        if is_shield_address(s) {
            return Some(s.to_string());
        }
        return None;
    }
    for field in ADDRESS_FIELDS {
        if let Some(s) = g.field(id, field).and_then(|fid| g.string_at(fid)) {
            if is_shield_address(s) {
                return Some(s.to_string());
            }
        }
    }
    None
}

fn address_known_arrays(g: &StateGraph) -> Option<String> {
    let root = g.root();
    for key in ADDRESS_ARRAYS {
        let Some(arr) = g.field(root, key) else { continue };
        let Node::Array(items) = g.node(arr) else { continue };
        for &item in items {
            if let Some(addr) = address_in_entry(g, item) {
                return Some(addr);
            }
        }
    }
    None
}

fn address_deep_scan(g: &StateGraph) -> Option<String> {
    let mut seen = HashSet::new();
    let mut stack = vec![g.root()];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        match g.node(id) {
            Node::String(s) if is_shield_address(s) => return Some(s.clone()),
            Node::Array(items) => stack.extend(items.iter().rev()),
            Node::Object(fields) => stack.extend(fields.iter().rev().map(|(_, v)| v)),
            _ => {}
        }
    }
    None
}

/// Last-resort scan of serialized text for `mn_shield-addr_` followed by
/// at least one bech32m body char.
pub fn scan_text_for_address(text: &str) -> Option<String> {
    let mut offset = 0;
    while let Some(pos) = text[offset..].find(SHIELD_ADDRESS_PREFIX) {
        let start = offset + pos;
        let body_start = start + SHIELD_ADDRESS_PREFIX.len();
        let body_len = text[body_start..]
            .chars()
            .take_while(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
            .count();
        if body_len > 0 {
            return Some(text[start..body_start + body_len].to_string());
        }
        offset = body_start;
    }
    None
}

fn is_tdust_tag(s: &str) -> bool {
    TDUST_TAGS.contains(&s)
}

/// Extract a tDUST balance as a decimal string. Same priority chain as
/// the address miner; the value is never converted through a float.
pub fn mine_balance(g: &StateGraph) -> Option<String> {
    let root = g.root();
    if let Some(balance) = balances_object_entry(g, root) {
        return Some(balance);
    }
    for key in BALANCE_ARRAYS {
        if let Some(arr) = g.field(root, key) {
            if let Some(balance) = balance_from_array(g, arr) {
                return Some(balance);
            }
        }
    }
    if let Some(balance) = balance_deep_scan(g) {
        return Some(balance);
    }
    scan_text_for_balance(&g.to_text())
}

/// `balances` as an object keyed by token tag (or the raw native token
/// type id, as some builds key by hex id instead of symbol).
fn balances_object_entry(g: &StateGraph, id: NodeId) -> Option<String> {
    let balances = g.field(id, "balances")?;
    let Node::Object(fields) = g.node(balances) else {
        return None;
    };
    for (key, value) in fields {
        if is_tdust_tag(key) || key == NATIVE_TOKEN_ID {
            if let Some(lit) = g.decimal_at(*value) {
                return Some(lit);
            }
        }
    }
    None
}

fn balance_entry_match(g: &StateGraph, id: NodeId) -> Option<String> {
    let tagged = BALANCE_TAG_FIELDS.iter().any(|field| {
        g.field(id, field)
            .and_then(|fid| g.string_at(fid))
            .is_some_and(is_tdust_tag)
    });
    if !tagged {
        return None;
    }
    for field in BALANCE_VALUE_FIELDS {
        if let Some(lit) = g.field(id, field).and_then(|fid| g.decimal_at(fid)) {
            return Some(lit);
        }
    }
    None
}

fn balance_from_array(g: &StateGraph, arr: NodeId) -> Option<String> {
    let Node::Array(items) = g.node(arr) else {
        return None;
    };
    items.iter().find_map(|&item| balance_entry_match(g, item))
}

fn balance_deep_scan(g: &StateGraph) -> Option<String> {
    let mut seen = HashSet::new();
    let mut stack = vec![g.root()];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        match g.node(id) {
            Node::Array(items) => stack.extend(items.iter().rev()),
            Node::Object(fields) => {
                if let Some(balance) = balances_object_entry(g, id) {
                    return Some(balance);
                }
                if let Some(balance) = balance_entry_match(g, id) {
                    return Some(balance);
                }
                stack.extend(fields.iter().rev().map(|(_, v)| v));
            }
            _ => {}
        }
    }
    None
}

/// Text fallback: a tDUST tag key followed by a (possibly quoted) numeric
/// literal, e.g. `"tDUST": "12500"` or `"tDUST":12500`.
pub fn scan_text_for_balance(text: &str) -> Option<String> {
    for tag in TDUST_TAGS {
        let needle = format!("\"{}\"", tag);
        let mut offset = 0;
        while let Some(pos) = text[offset..].find(&needle) {
            let after = offset + pos + needle.len();
            if let Some(lit) = numeric_literal_after_colon(&text[after..]) {
                return Some(lit);
            }
            offset = after;
        }
    }
    None
}

fn numeric_literal_after_colon(rest: &str) -> Option<String> {
    let mut chars = rest.char_indices().skip_while(|(_, c)| c.is_whitespace());
    let (_, colon) = chars.next()?;
    if colon != ':' {
        return None;
    }
    let tail: String = chars.map(|(_, c)| c).collect();
    let tail = tail.trim_start();
    let tail = tail.strip_prefix('"').unwrap_or(tail);
    let lit: String = tail
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if lit.chars().any(|c| c.is_ascii_digit()) {
        Some(lit)
    } else {
        None
    }
}

/// Normalize one object node into a qualified coin, accepting the field
/// spellings observed across wallet builds.
fn normalize_coin(g: &StateGraph, id: NodeId) -> Option<Coin> {
    if !matches!(g.node(id), Node::Object(_)) {
        return None;
    }
    let token_type = COIN_TYPE_FIELDS
        .iter()
        .find_map(|f| g.field(id, f).and_then(|fid| g.string_at(fid)))?
        .to_string();
    let nonce = COIN_NONCE_FIELDS
        .iter()
        .find_map(|f| g.field(id, f).and_then(|fid| g.string_at(fid)))?
        .to_string();
    let value = COIN_VALUE_FIELDS
        .iter()
        .find_map(|f| g.field(id, f).and_then(|fid| g.u128_at(fid)))?;
    let position = COIN_POSITION_FIELDS
        .iter()
        .find_map(|f| g.field(id, f).and_then(|fid| g.u64_at(fid)))?;
    Some(Coin {
        token_type,
        nonce,
        value,
        position,
    })
}

/// Collect every coin-shaped object in the graph, deduplicated by
/// `(type, nonce, value, position)`. First occurrence wins.
pub fn mine_coins(g: &StateGraph) -> Vec<Coin> {
    let mut out = Vec::new();
    let mut keys: HashSet<(String, String, u128, u64)> = HashSet::new();
    let mut seen = HashSet::new();
    let mut stack = vec![g.root()];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        match g.node(id) {
            Node::Array(items) => stack.extend(items.iter().rev()),
            Node::Object(fields) => {
                if let Some(coin) = normalize_coin(g, id) {
                    let key = (
                        coin.token_type.clone(),
                        coin.nonce.clone(),
                        coin.value,
                        coin.position,
                    );
                    if keys.insert(key) {
                        out.push(coin);
                    }
                }
                stack.extend(fields.iter().rev().map(|(_, v)| v));
            }
            _ => {}
        }
    }
    out
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::Value;

    fn value_strategy() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<u64>().prop_map(|n| Value::Number(n.into())),
            "[a-z0-9_]{0,12}".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 32, 6, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                proptest::collection::btree_map("[a-z_]{1,8}", inner, 0..6).prop_map(|m| {
                    Value::Object(m.into_iter().collect())
                }),
            ]
        })
    }

    proptest! {
        #[test]
        fn miners_terminate_and_coins_stay_unique(v in value_strategy()) {
            let g = StateGraph::from_value(&v);
            let _ = mine_address(&g);
            let _ = mine_balance(&g);
            let coins = mine_coins(&g);

            let mut keys: Vec<_> = coins
                .iter()
                .map(|c| (c.token_type.clone(), c.nonce.clone(), c.value, c.position))
                .collect();
            let before = keys.len();
            keys.sort();
            keys.dedup();
            prop_assert_eq!(before, keys.len());
        }

        #[test]
        fn text_rendering_round_trips_through_the_parser(v in value_strategy()) {
            let g = StateGraph::from_value(&v);
            // acyclic graphs must render to valid JSON
            let text = g.to_text();
            prop_assert!(serde_json::from_str::<Value>(&text).is_ok());
        }
    }
}
