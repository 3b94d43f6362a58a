//! Canonical on-disk form of a [`Block`]: a thin, bit-exact JSON
//! serializer/deserializer, the only way this crate touches I/O — everything
//! else (files, FASTA, the CLI) is the caller's job.
//!
//! Output keys are sorted (`BTreeMap` iterates in key order) so two
//! semantically equal blocks always serialize to byte-identical JSON, which
//! the accuracy harness relies on when diffing runs.

pub use super::Error;

use crate::arena::NodeId;
use crate::block::{Block, DelMap, InsMap, SnpMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Serialize, Deserialize)]
struct BlockDto {
    id: String,
    seq: String,
    gaps: BTreeMap<String, usize>,
    mutate: BTreeMap<String, BTreeMap<String, String>>,
    insert: BTreeMap<String, BTreeMap<String, String>>,
    delete: BTreeMap<String, BTreeMap<String, usize>>,
}

fn ascii(bytes: &[u8]) -> Result<String, Error> {
    if !bytes.is_ascii() {
        return Err(Error::NonAscii);
    }
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn parse_pos(s: &str) -> Result<usize, Error> {
    s.parse().map_err(|_| Error::MalformedKey(s.to_string()))
}

fn parse_node_id(key: &str) -> Result<NodeId, Error> {
    key.parse::<u64>()
        .map(NodeId::new)
        .map_err(|_| Error::MalformedKey(key.to_string()))
}

/// Parse an insertion key of the form `"[<pos>,<off>]"`.
fn parse_ins_key(key: &str) -> Result<(usize, usize), Error> {
    let inner = key
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| Error::MalformedKey(key.to_string()))?;
    let (pos, off) = inner
        .split_once(',')
        .ok_or_else(|| Error::MalformedKey(key.to_string()))?;
    Ok((parse_pos(pos.trim())?, parse_pos(off.trim())?))
}

/// Serialize a block to its canonical JSON form.
pub fn to_json(block: &Block) -> Result<String, Error> {
    let gaps = block
        .raw_gaps()
        .iter()
        .map(|(&p, &g)| (p.to_string(), g))
        .collect();

    let mut mutate = BTreeMap::new();
    let mut insert = BTreeMap::new();
    let mut delete = BTreeMap::new();
    for node in block.members() {
        let key = node.0.to_string();

        let snp: BTreeMap<String, String> = block
            .raw_snp(node)?
            .iter()
            .map(|(&p, &b)| ascii(&[b]).map(|s| (p.to_string(), s)))
            .collect::<Result<_, Error>>()?;
        mutate.insert(key.clone(), snp);

        let ins: BTreeMap<String, String> = block
            .raw_ins(node)?
            .iter()
            .map(|(&(p, off), bytes)| ascii(bytes).map(|s| (format!("[{p},{off}]"), s)))
            .collect::<Result<_, Error>>()?;
        insert.insert(key.clone(), ins);

        let del: BTreeMap<String, usize> = block
            .raw_del(node)?
            .iter()
            .map(|(&p, &len)| (p.to_string(), len))
            .collect();
        delete.insert(key, del);
    }

    let dto = BlockDto {
        id: block.id().to_string(),
        seq: ascii(block.sequence())?,
        gaps,
        mutate,
        insert,
        delete,
    };
    serde_json::to_string_pretty(&dto).map_err(Error::from)
}

/// Parse a block from its canonical JSON form, appending every member in
/// ascending node-id order (the file carries no other ordering signal).
pub fn from_json(json: &str) -> Result<Block, Error> {
    let dto: BlockDto = serde_json::from_str(json)?;

    let gaps = dto
        .gaps
        .iter()
        .map(|(p, &g)| parse_pos(p).map(|p| (p, g)))
        .collect::<Result<BTreeMap<_, _>, Error>>()?;

    let mut block = Block::with_gaps(dto.seq.into_bytes(), gaps);

    let mut keys: Vec<&String> = dto.mutate.keys().collect();
    keys.sort();
    for key in keys {
        let node = parse_node_id(key)?;

        let snp: SnpMap = dto.mutate[key]
            .iter()
            .map(|(p, b)| {
                if b.len() != 1 {
                    return Err(Error::MalformedKey(b.clone()));
                }
                Ok((parse_pos(p)?, b.as_bytes()[0]))
            })
            .collect::<Result<_, Error>>()?;

        let empty_ins = BTreeMap::new();
        let ins_entries = dto.insert.get(key).unwrap_or(&empty_ins);
        let ins: InsMap = ins_entries
            .iter()
            .map(|(k, v)| parse_ins_key(k).map(|pos| (pos, v.as_bytes().to_vec())))
            .collect::<Result<_, Error>>()?;

        let empty_del = BTreeMap::new();
        let del_entries = dto.delete.get(key).unwrap_or(&empty_del);
        let del: DelMap = del_entries
            .iter()
            .map(|(p, &len)| parse_pos(p).map(|p| (p, len)))
            .collect::<Result<_, Error>>()?;

        block.append(node, snp, ins, del)?;
    }

    Ok(block)
}
