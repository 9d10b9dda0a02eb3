//! Structured resources.
//!
//! A [`Resources`] collection is what the ledger records per client and
//! agent. Entries carry optional metadata (a dynamic reservation, a
//! persistent volume) that fairness arithmetic ignores: the sorter works
//! on the *stripped* scalar projection of these values.
//!
//! # Text syntax
//!
//! ```text
//! cpus:4; mem:1024; ports:[31000-32000]; zones:{a,b}
//! cpus(eng,alice):2; disk(eng)[vol-1:/data]:100
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::role;
use crate::scalar::Scalar;

/// Errors produced while parsing the resource text syntax.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourcesError {
    #[error("missing ':' between name and value in '{0}'")]
    MissingSeparator(String),

    #[error("empty resource name in '{0}'")]
    EmptyName(String),

    #[error("invalid scalar '{value}' for resource '{name}'")]
    InvalidScalar { name: String, value: String },

    #[error("invalid range '{0}'")]
    InvalidRange(String),

    #[error("unterminated '{0}' in '{1}'")]
    Unterminated(char, String),

    #[error("invalid reservation in '{0}'")]
    InvalidReservation(String),

    #[error("invalid volume in '{0}'")]
    InvalidVolume(String),

    #[error("unexpected input in '{0}'")]
    Unexpected(String),
}

pub type ResourcesResult<T> = Result<T, ResourcesError>;

// ── Ranges ──────────────────────────────────────────────────────────

/// A set of inclusive `u64` intervals, kept sorted and coalesced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ranges(Vec<(u64, u64)>);

impl Ranges {
    pub fn new(ranges: impl IntoIterator<Item = (u64, u64)>) -> Self {
        let mut out = Self(
            ranges
                .into_iter()
                .map(|(a, b)| (a.min(b), a.max(b)))
                .collect(),
        );
        out.coalesce();
        out
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.0.iter().copied()
    }

    /// Number of individual values covered.
    pub fn count(&self) -> u64 {
        self.0.iter().map(|(lo, hi)| hi - lo + 1).sum()
    }

    pub fn add(&mut self, other: &Ranges) {
        self.0.extend_from_slice(&other.0);
        self.coalesce();
    }

    pub fn subtract(&mut self, other: &Ranges) {
        let mut kept = Vec::with_capacity(self.0.len());
        for &(lo, hi) in &self.0 {
            let mut pieces = vec![(lo, hi)];
            for &(cut_lo, cut_hi) in &other.0 {
                pieces = pieces
                    .into_iter()
                    .flat_map(|(a, b)| split_around(a, b, cut_lo, cut_hi))
                    .collect();
            }
            kept.extend(pieces);
        }
        self.0 = kept;
    }

    /// True if every value in `other` is covered by `self`.
    pub fn contains(&self, other: &Ranges) -> bool {
        other
            .0
            .iter()
            .all(|&(a, b)| self.0.iter().any(|&(lo, hi)| lo <= a && b <= hi))
    }

    fn coalesce(&mut self) {
        self.0.sort_unstable();
        let mut merged: Vec<(u64, u64)> = Vec::with_capacity(self.0.len());
        for &(lo, hi) in &self.0 {
            match merged.last_mut() {
                Some(last) if lo <= last.1.saturating_add(1) => last.1 = last.1.max(hi),
                _ => merged.push((lo, hi)),
            }
        }
        self.0 = merged;
    }
}

fn split_around(a: u64, b: u64, cut_lo: u64, cut_hi: u64) -> Vec<(u64, u64)> {
    if cut_hi < a || cut_lo > b {
        return vec![(a, b)];
    }
    let mut out = Vec::with_capacity(2);
    if cut_lo > a {
        out.push((a, cut_lo - 1));
    }
    if cut_hi < b {
        out.push((cut_hi + 1, b));
    }
    out
}

impl fmt::Display for Ranges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, (lo, hi)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{lo}-{hi}")?;
        }
        f.write_str("]")
    }
}

// ── Value ───────────────────────────────────────────────────────────

/// The value carried by a single resource entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Scalar(Scalar),
    Ranges(Ranges),
    Set(BTreeSet<String>),
}

impl Value {
    /// Zero or negative scalars and empty ranges/sets carry nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Scalar(s) => !s.is_positive(),
            Value::Ranges(r) => r.is_empty(),
            Value::Set(s) => s.is_empty(),
        }
    }

    fn same_kind(&self, other: &Value) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    fn merge(&mut self, other: &Value) {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => *a += *b,
            (Value::Ranges(a), Value::Ranges(b)) => a.add(b),
            (Value::Set(a), Value::Set(b)) => a.extend(b.iter().cloned()),
            _ => {}
        }
    }

    fn covers(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => a >= b,
            (Value::Ranges(a), Value::Ranges(b)) => a.contains(b),
            (Value::Set(a), Value::Set(b)) => a.is_superset(b),
            _ => false,
        }
    }

    fn remove(&mut self, other: &Value) {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => *a -= *b,
            (Value::Ranges(a), Value::Ranges(b)) => a.subtract(b),
            (Value::Set(a), Value::Set(b)) => a.retain(|item| !b.contains(item)),
            _ => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(s) => write!(f, "{s}"),
            Value::Ranges(r) => write!(f, "{r}"),
            Value::Set(items) => {
                f.write_str("{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(item)?;
                }
                f.write_str("}")
            }
        }
    }
}

// ── Resource ────────────────────────────────────────────────────────

/// A dynamic reservation of a resource for a role.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reservation {
    pub role: String,
    pub principal: Option<String>,
}

/// Persistent volume metadata attached to a disk resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiskInfo {
    pub persistence_id: String,
    pub container_path: Option<String>,
}

/// A single named resource entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: String,
    pub value: Value,
    pub reservation: Option<Reservation>,
    pub disk: Option<DiskInfo>,
}

impl Resource {
    pub fn scalar(name: impl Into<String>, value: f64) -> Self {
        Self::with_value(name, Value::Scalar(Scalar::from_f64(value)))
    }

    pub fn ranges(name: impl Into<String>, ranges: impl IntoIterator<Item = (u64, u64)>) -> Self {
        Self::with_value(name, Value::Ranges(Ranges::new(ranges)))
    }

    pub fn set<S: Into<String>>(name: impl Into<String>, items: impl IntoIterator<Item = S>) -> Self {
        Self::with_value(name, Value::Set(items.into_iter().map(Into::into).collect()))
    }

    pub fn with_value(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            reservation: None,
            disk: None,
        }
    }

    /// Attach a dynamic reservation.
    pub fn reserved(mut self, role: impl Into<String>, principal: Option<&str>) -> Self {
        self.reservation = Some(Reservation {
            role: role.into(),
            principal: principal.map(str::to_string),
        });
        self
    }

    /// Mark this resource as a persistent volume.
    pub fn volume(mut self, persistence_id: impl Into<String>, container_path: Option<&str>) -> Self {
        self.disk = Some(DiskInfo {
            persistence_id: persistence_id.into(),
            container_path: container_path.map(str::to_string),
        });
        self
    }

    pub fn is_persistent_volume(&self) -> bool {
        self.disk.is_some()
    }

    pub fn is_reserved(&self) -> bool {
        self.reservation.is_some()
    }

    pub fn as_scalar(&self) -> Option<Scalar> {
        match self.value {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    fn same_slot(&self, other: &Resource) -> bool {
        self.name == other.name
            && self.reservation == other.reservation
            && self.disk == other.disk
            && self.value.same_kind(&other.value)
    }

    // Volumes are indivisible: only an identical entry covers one.
    fn covers(&self, other: &Resource) -> bool {
        if !self.same_slot(other) {
            return false;
        }
        if self.is_persistent_volume() {
            self.value == other.value
        } else {
            self.value.covers(&other.value)
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(reservation) = &self.reservation {
            match &reservation.principal {
                Some(principal) => write!(f, "({},{})", reservation.role, principal)?,
                None => write!(f, "({})", reservation.role)?,
            }
        }
        if let Some(disk) = &self.disk {
            match &disk.container_path {
                Some(path) => write!(f, "[{}:{}]", disk.persistence_id, path)?,
                None => write!(f, "[{}]", disk.persistence_id)?,
            }
        }
        write!(f, ":{}", self.value)
    }
}

// ── Resources ───────────────────────────────────────────────────────

/// A collection of resource entries.
///
/// Entries with the same name, value kind, reservation and volume are
/// merged on insertion, except persistent volumes which stay distinct.
/// Entries that become empty are dropped.
#[derive(Debug, Clone, Default)]
pub struct Resources(Vec<Resource>);

impl Resources {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Resource> {
        self.0.iter()
    }

    /// Merge `resource` into a like entry, or append it. Volumes never merge.
    pub fn push(&mut self, resource: Resource) {
        if resource.value.is_empty() {
            return;
        }
        if !resource.is_persistent_volume() {
            if let Some(existing) = self.0.iter_mut().find(|r| r.same_slot(&resource)) {
                existing.value.merge(&resource.value);
                return;
            }
        }
        self.0.push(resource);
    }

    /// Remove `resource` from the matching entry. No-op if nothing matches.
    pub fn subtract(&mut self, resource: &Resource) {
        let position = if resource.is_persistent_volume() {
            self.0.iter().position(|r| r.covers(resource))
        } else {
            self.0.iter().position(|r| r.same_slot(resource))
        };
        let Some(idx) = position else { return };

        let entry = &mut self.0[idx];
        if entry.is_persistent_volume() {
            self.0.remove(idx);
            return;
        }
        entry.value.remove(&resource.value);
        if entry.value.is_empty() {
            self.0.remove(idx);
        }
    }

    pub fn contains_resource(&self, resource: &Resource) -> bool {
        self.0.iter().any(|r| r.covers(resource))
    }

    /// True if every entry of `other` can be subtracted from `self`.
    pub fn contains(&self, other: &Resources) -> bool {
        let mut remaining = self.clone();
        for resource in other.iter() {
            if !remaining.contains_resource(resource) {
                return false;
            }
            remaining.subtract(resource);
        }
        true
    }

    /// Scalar entries as `(name, amount)`, metadata ignored.
    pub fn scalars(&self) -> impl Iterator<Item = (&str, Scalar)> {
        self.0
            .iter()
            .filter_map(|r| r.as_scalar().map(|s| (r.name.as_str(), s)))
    }

    /// Total scalar amount of `name` across reservations and volumes.
    pub fn scalar(&self, name: &str) -> Scalar {
        self.scalars()
            .filter(|(n, _)| *n == name)
            .map(|(_, s)| s)
            .sum()
    }

    pub fn filter(&self, predicate: impl Fn(&Resource) -> bool) -> Resources {
        Self(self.0.iter().filter(|r| predicate(r)).cloned().collect())
    }

    /// Resources reserved for exactly `role`.
    pub fn reserved_for(&self, role: &str) -> Resources {
        self.filter(|r| r.reservation.as_ref().is_some_and(|res| res.role == role))
    }

    pub fn unreserved(&self) -> Resources {
        self.filter(|r| !r.is_reserved())
    }

    pub fn persistent_volumes(&self) -> Resources {
        self.filter(Resource::is_persistent_volume)
    }
}

impl PartialEq for Resources {
    fn eq(&self, other: &Self) -> bool {
        self.contains(other) && other.contains(self)
    }
}

impl Eq for Resources {}

impl From<Resource> for Resources {
    fn from(resource: Resource) -> Self {
        let mut out = Self::new();
        out.push(resource);
        out
    }
}

impl FromIterator<Resource> for Resources {
    fn from_iter<I: IntoIterator<Item = Resource>>(iter: I) -> Self {
        let mut out = Self::new();
        for resource in iter {
            out.push(resource);
        }
        out
    }
}

impl<'a> IntoIterator for &'a Resources {
    type Item = &'a Resource;
    type IntoIter = std::slice::Iter<'a, Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl AddAssign<&Resources> for Resources {
    fn add_assign(&mut self, rhs: &Resources) {
        for resource in rhs {
            self.push(resource.clone());
        }
    }
}

impl SubAssign<&Resources> for Resources {
    fn sub_assign(&mut self, rhs: &Resources) {
        for resource in rhs {
            self.subtract(resource);
        }
    }
}

impl Add for &Resources {
    type Output = Resources;
    fn add(self, rhs: &Resources) -> Resources {
        let mut out = self.clone();
        out += rhs;
        out
    }
}

impl Sub for &Resources {
    type Output = Resources;
    fn sub(self, rhs: &Resources) -> Resources {
        let mut out = self.clone();
        out -= rhs;
        out
    }
}

impl fmt::Display for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("{}");
        }
        for (i, resource) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{resource}")?;
        }
        Ok(())
    }
}

impl FromStr for Resources {
    type Err = ResourcesError;

    fn from_str(s: &str) -> ResourcesResult<Self> {
        let mut out = Resources::new();
        for entry in s.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            out.push(parse_resource(entry)?);
        }
        Ok(out)
    }
}

impl Serialize for Resources {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Resources {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ── Parsing ─────────────────────────────────────────────────────────

fn parse_resource(entry: &str) -> ResourcesResult<Resource> {
    let (head, raw_value) = entry
        .rsplit_once(':')
        .ok_or_else(|| ResourcesError::MissingSeparator(entry.to_string()))?;

    let name_end = head.find(['(', '[']).unwrap_or(head.len());
    let name = head[..name_end].trim();
    if name.is_empty() {
        return Err(ResourcesError::EmptyName(entry.to_string()));
    }

    let mut rest = head[name_end..].trim();
    let mut reservation = None;
    if let Some(inner) = rest.strip_prefix('(') {
        let close = inner
            .find(')')
            .ok_or_else(|| ResourcesError::Unterminated('(', entry.to_string()))?;
        reservation = Some(parse_reservation(&inner[..close], entry)?);
        rest = inner[close + 1..].trim();
    }

    let mut disk = None;
    if let Some(inner) = rest.strip_prefix('[') {
        let close = inner
            .find(']')
            .ok_or_else(|| ResourcesError::Unterminated('[', entry.to_string()))?;
        disk = Some(parse_volume(&inner[..close], entry)?);
        rest = inner[close + 1..].trim();
    }

    if !rest.is_empty() {
        return Err(ResourcesError::Unexpected(entry.to_string()));
    }

    Ok(Resource {
        name: name.to_string(),
        value: parse_value(name, raw_value.trim(), entry)?,
        reservation,
        disk,
    })
}

fn parse_reservation(body: &str, entry: &str) -> ResourcesResult<Reservation> {
    let invalid = || ResourcesError::InvalidReservation(entry.to_string());
    let mut parts = body.split(',').map(str::trim);
    let role = parts.next().unwrap_or_default();
    role::validate(role).map_err(|_| invalid())?;
    let principal = parts.next().filter(|p| !p.is_empty()).map(str::to_string);
    if parts.next().is_some() {
        return Err(invalid());
    }
    Ok(Reservation {
        role: role.to_string(),
        principal,
    })
}

fn parse_volume(body: &str, entry: &str) -> ResourcesResult<DiskInfo> {
    let (id, path) = match body.split_once(':') {
        Some((id, path)) => (id.trim(), Some(path.trim().to_string())),
        None => (body.trim(), None),
    };
    if id.is_empty() {
        return Err(ResourcesError::InvalidVolume(entry.to_string()));
    }
    Ok(DiskInfo {
        persistence_id: id.to_string(),
        container_path: path.filter(|p| !p.is_empty()),
    })
}

fn parse_value(name: &str, raw: &str, entry: &str) -> ResourcesResult<Value> {
    if let Some(body) = raw.strip_prefix('[') {
        let body = body
            .strip_suffix(']')
            .ok_or_else(|| ResourcesError::Unterminated('[', entry.to_string()))?;
        let mut ranges = Vec::new();
        for item in body.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            ranges.push(parse_range(item)?);
        }
        return Ok(Value::Ranges(Ranges::new(ranges)));
    }

    if let Some(body) = raw.strip_prefix('{') {
        let body = body
            .strip_suffix('}')
            .ok_or_else(|| ResourcesError::Unterminated('{', entry.to_string()))?;
        let items = body
            .split(',')
            .map(str::trim)
            .filter(|i| !i.is_empty())
            .map(str::to_string)
            .collect();
        return Ok(Value::Set(items));
    }

    let invalid = || ResourcesError::InvalidScalar {
        name: name.to_string(),
        value: raw.to_string(),
    };
    let value: f64 = raw.parse().map_err(|_| invalid())?;
    if !value.is_finite() || value < 0.0 || value > Scalar::MAX_WHOLE as f64 {
        return Err(invalid());
    }
    Ok(Value::Scalar(Scalar::from_f64(value)))
}

fn parse_range(item: &str) -> ResourcesResult<(u64, u64)> {
    let invalid = || ResourcesError::InvalidRange(item.to_string());
    let (lo, hi) = match item.split_once('-') {
        Some((lo, hi)) => (lo.trim(), hi.trim()),
        None => (item, item),
    };
    let lo: u64 = lo.parse().map_err(|_| invalid())?;
    let hi: u64 = hi.parse().map_err(|_| invalid())?;
    if lo > hi {
        return Err(invalid());
    }
    Ok((lo, hi))
}
