//! Task × role responsibility matrix
//!
//! A cell holds one letter or a combination such as `RA`. Blank and null
//! cells decode as unassigned; cells with unknown letters are dropped with a
//! warning rather than failing the whole matrix.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Responsibility letter assigned to a role for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Responsibility {
    /// R: does the work
    Responsible,
    /// A: answers for the outcome
    Accountable,
    /// S: supports the responsible role
    Support,
    /// C: is consulted
    Consulted,
    /// I: is kept informed
    Informed,
}

impl Responsibility {
    /// All letters in display order
    pub const ALL: [Self; 5] = [
        Self::Responsible,
        Self::Accountable,
        Self::Support,
        Self::Consulted,
        Self::Informed,
    ];

    /// Single-letter code
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::Responsible => 'R',
            Self::Accountable => 'A',
            Self::Support => 'S',
            Self::Consulted => 'C',
            Self::Informed => 'I',
        }
    }

    /// Parse a single-letter code, case-insensitive
    #[must_use]
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'R' => Some(Self::Responsible),
            'A' => Some(Self::Accountable),
            'S' => Some(Self::Support),
            'C' => Some(Self::Consulted),
            'I' => Some(Self::Informed),
            _ => None,
        }
    }

    /// Roles that only support, consult or stay informed
    #[inline]
    #[must_use]
    pub fn is_passive(self) -> bool {
        matches!(self, Self::Support | Self::Consulted | Self::Informed)
    }

    const fn bit(self) -> u8 {
        1 << self as u8
    }
}

impl fmt::Display for Responsibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Letters held by one cell
///
/// Order does not matter: `AR` and `RA` are the same assignment. A letter
/// written more than once is remembered so validation can flag it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Assignment {
    letters: u8,
    repeated: u8,
}

impl Assignment {
    /// Whether `responsibility` is one of the letters
    #[inline]
    #[must_use]
    pub fn contains(self, responsibility: Responsibility) -> bool {
        self.letters & responsibility.bit() != 0
    }

    /// Whether `responsibility` was written more than once
    #[inline]
    #[must_use]
    pub fn is_repeated(self, responsibility: Responsibility) -> bool {
        self.repeated & responsibility.bit() != 0
    }

    /// Add a letter
    pub fn insert(&mut self, responsibility: Responsibility) {
        if self.contains(responsibility) {
            self.repeated |= responsibility.bit();
        }
        self.letters |= responsibility.bit();
    }

    /// Builder form of [`insert`](Self::insert)
    #[must_use]
    pub fn with(mut self, responsibility: Responsibility) -> Self {
        self.insert(responsibility);
        self
    }

    /// Distinct letters in display order
    pub fn iter(self) -> impl Iterator<Item = Responsibility> {
        Responsibility::ALL.into_iter().filter(move |r| self.contains(*r))
    }

    /// Number of distinct letters
    #[inline]
    #[must_use]
    pub fn len(self) -> usize {
        self.letters.count_ones() as usize
    }

    /// Whether no letter is held
    #[inline]
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.letters == 0
    }

    /// The letter, when exactly one is held
    #[must_use]
    pub fn single(self) -> Option<Responsibility> {
        let mut letters = self.iter();
        match (letters.next(), letters.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    }

    /// Whether the cell holds `responsibility` and nothing else
    #[inline]
    #[must_use]
    pub fn is_only(self, responsibility: Responsibility) -> bool {
        self.single() == Some(responsibility)
    }

    /// Two distinct letters at most, none repeated
    #[inline]
    #[must_use]
    pub fn is_valid_combination(self) -> bool {
        self.len() <= 2 && self.repeated == 0
    }

    /// The same role both does and answers for the work
    #[inline]
    #[must_use]
    pub fn binds_duties(self) -> bool {
        self.contains(Responsibility::Responsible) && self.contains(Responsibility::Accountable)
    }
}

impl From<Responsibility> for Assignment {
    fn from(responsibility: Responsibility) -> Self {
        Self::default().with(responsibility)
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for letter in self.iter() {
            write!(f, "{letter}")?;
            if self.is_repeated(letter) {
                write!(f, "{letter}")?;
            }
        }
        Ok(())
    }
}

/// Cell text containing something other than responsibility letters
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid responsibility '{value}'")]
pub struct InvalidAssignment {
    /// Rejected text
    pub value: String,
}

impl FromStr for Assignment {
    type Err = InvalidAssignment;

    /// Parse cell text; blank text is an empty assignment
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        text.chars()
            .filter(|c| !c.is_whitespace())
            .try_fold(Self::default(), |cell, c| {
                Responsibility::from_letter(c)
                    .map(|letter| cell.with(letter))
                    .ok_or_else(|| InvalidAssignment {
                        value: text.to_owned(),
                    })
            })
    }
}

type RawMatrix = BTreeMap<String, Option<BTreeMap<String, Value>>>;

/// Sparse task → role → assignment map
///
/// Blank cells are simply absent. Rows with no cells are kept: a task that
/// exists but has no assignments is meaningful to validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawMatrix", into = "RawMatrix")]
pub struct ResponsibilityMatrix {
    rows: BTreeMap<String, BTreeMap<String, Assignment>>,
}

impl ResponsibilityMatrix {
    /// Create an empty matrix
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cell of `role` for `task`, replacing what was there
    ///
    /// An empty assignment clears the cell but keeps the row.
    pub fn assign(
        &mut self,
        task: impl Into<String>,
        role: impl Into<String>,
        assignment: impl Into<Assignment>,
    ) {
        let row = self.rows.entry(task.into()).or_default();
        let (role, assignment) = (role.into(), assignment.into());
        if assignment.is_empty() {
            row.remove(&role);
        } else {
            row.insert(role, assignment);
        }
    }

    /// Builder form of [`assign`](Self::assign)
    #[must_use]
    pub fn with(
        mut self,
        task: impl Into<String>,
        role: impl Into<String>,
        assignment: impl Into<Assignment>,
    ) -> Self {
        self.assign(task, role, assignment);
        self
    }

    /// Ensure a row exists for `task`, even if empty
    pub fn add_task(&mut self, task: impl Into<String>) {
        self.rows.entry(task.into()).or_default();
    }

    /// Clear one cell
    pub fn unassign(&mut self, task: &str, role: &str) {
        if let Some(row) = self.rows.get_mut(task) {
            row.remove(role);
        }
    }

    /// Look up one cell
    #[must_use]
    pub fn get(&self, task: &str, role: &str) -> Option<Assignment> {
        self.rows.get(task).and_then(|row| row.get(role)).copied()
    }

    /// All cells of one task
    #[must_use]
    pub fn row(&self, task: &str) -> Option<&BTreeMap<String, Assignment>> {
        self.rows.get(task)
    }

    /// Iterate rows in task-id order
    pub fn rows(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, Assignment>)> {
        self.rows.iter().map(|(task, row)| (task.as_str(), row))
    }

    /// Task ids in order
    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    /// Roles that hold at least one assignment
    #[must_use]
    pub fn roles_in_use(&self) -> BTreeSet<&str> {
        self.rows
            .values()
            .flat_map(|row| row.keys().map(String::as_str))
            .collect()
    }

    /// Drop a whole row
    pub fn remove_task(&mut self, task: &str) -> bool {
        self.rows.remove(task).is_some()
    }

    /// Keep only rows whose task id satisfies `keep`
    pub fn retain_tasks(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.rows.retain(|task, _| keep(task));
    }

    /// Number of rows
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the matrix has no rows
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn decode_cell(task: &str, role: &str, value: &Value) -> Option<Assignment> {
    let text = match value {
        Value::Null => return None,
        Value::String(text) => text,
        other => {
            warn!(task, role, value = %other, "dropping non-text matrix cell");
            return None;
        }
    };
    match text.parse::<Assignment>() {
        Ok(cell) if cell.is_empty() => None,
        Ok(cell) => Some(cell),
        Err(err) => {
            warn!(task, role, error = %err, "dropping matrix cell");
            None
        }
    }
}

impl From<RawMatrix> for ResponsibilityMatrix {
    fn from(raw: RawMatrix) -> Self {
        let mut matrix = Self::new();
        for (task, cells) in raw {
            matrix.add_task(task.clone());
            for (role, value) in cells.unwrap_or_default() {
                if let Some(cell) = decode_cell(&task, &role, &value) {
                    matrix.assign(task.clone(), role, cell);
                }
            }
        }
        matrix
    }
}

impl From<ResponsibilityMatrix> for RawMatrix {
    fn from(matrix: ResponsibilityMatrix) -> Self {
        matrix
            .rows
            .into_iter()
            .map(|(task, row)| {
                let cells = row
                    .into_iter()
                    .map(|(role, cell)| (role, Value::String(cell.to_string())))
                    .collect();
                (task, Some(cells))
            })
            .collect()
    }
}
