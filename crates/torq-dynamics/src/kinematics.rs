//! Kinematic-chain interface.
//!
//! The dynamic model consumes a kinematic model through a thin trait: the
//! ordered joint symbols and a base-to-frame transform lookup. `DhChain` is
//! a serial-chain implementation assembled from standard Denavit–Hartenberg
//! rows; anything else that can answer `T(0, frame)` works just as well.

use torq_expr::{Expr, Sym};
use torq_transform::Ht;

use crate::error::{DynError, Result};

/// What the dynamic model needs from a kinematic model.
pub trait Kinematics {
    /// The ordered joint variable symbols q.
    fn joint_symbols(&self) -> &[Sym];

    /// The symbolic transform T(0, frame) from base to the named frame.
    fn base_transform(&self, frame: &str) -> Result<Ht>;
}

/// Joint variables with no named frames.
///
/// For models whose attachments are described directly in base-frame
/// coordinates; any frame lookup is an unknown-frame error.
#[derive(Debug, Clone)]
pub struct JointSpace {
    q: Vec<Sym>,
}

impl JointSpace {
    /// `n` joints named q1..qn.
    pub fn new(n: usize) -> Self {
        Self {
            q: Expr::symbol_vector("q", n),
        }
    }

    pub fn from_symbols(q: &[Sym]) -> Self {
        Self { q: q.to_vec() }
    }
}

impl Kinematics for JointSpace {
    fn joint_symbols(&self) -> &[Sym] {
        &self.q
    }

    fn base_transform(&self, frame: &str) -> Result<Ht> {
        if frame == "base" {
            Ok(Ht::identity())
        } else {
            Err(DynError::UnknownFrame(frame.to_string()))
        }
    }
}

/// A serial chain described by standard DH rows, one named frame per link.
#[derive(Debug, Clone)]
pub struct DhChain {
    q: Vec<Sym>,
    frames: Vec<(String, Ht)>,
}

impl DhChain {
    pub fn builder() -> DhChainBuilder {
        DhChainBuilder::new()
    }

    /// Names of the link frames, base to tip.
    pub fn frame_names(&self) -> impl Iterator<Item = &str> {
        self.frames.iter().map(|(name, _)| name.as_str())
    }

    /// Transform of the last link, or identity for an empty chain.
    pub fn tip(&self) -> Ht {
        self.frames
            .last()
            .map(|(_, h)| h.clone())
            .unwrap_or_else(Ht::identity)
    }
}

impl Kinematics for DhChain {
    fn joint_symbols(&self) -> &[Sym] {
        &self.q
    }

    fn base_transform(&self, frame: &str) -> Result<Ht> {
        if frame == "base" {
            return Ok(Ht::identity());
        }
        self.frames
            .iter()
            .find(|(name, _)| name == frame)
            .map(|(_, h)| h.clone())
            .ok_or_else(|| DynError::UnknownFrame(frame.to_string()))
    }
}

/// Builder accumulating DH rows; joint symbols are assigned q1, q2, … in
/// insertion order.
pub struct DhChainBuilder {
    q: Vec<Sym>,
    rows: Vec<(String, [Expr; 4])>,
}

impl DhChainBuilder {
    pub fn new() -> Self {
        Self {
            q: Vec::new(),
            rows: Vec::new(),
        }
    }

    fn next_joint(&mut self) -> Expr {
        let sym = Sym::new(&format!("q{}", self.q.len() + 1));
        self.q.push(sym.clone());
        sym.expr()
    }

    /// Revolute joint: θ is the joint variable.
    pub fn revolute(
        mut self,
        frame: &str,
        d: impl Into<Expr>,
        a: impl Into<Expr>,
        alpha: impl Into<Expr>,
    ) -> Self {
        let theta = self.next_joint();
        self.rows
            .push((frame.to_string(), [theta, d.into(), a.into(), alpha.into()]));
        self
    }

    /// Prismatic joint: d is the joint variable.
    pub fn prismatic(
        mut self,
        frame: &str,
        theta: impl Into<Expr>,
        a: impl Into<Expr>,
        alpha: impl Into<Expr>,
    ) -> Self {
        let d = self.next_joint();
        self.rows
            .push((frame.to_string(), [theta.into(), d, a.into(), alpha.into()]));
        self
    }

    /// A fixed (non-actuated) DH row.
    pub fn fixed(
        mut self,
        frame: &str,
        theta: impl Into<Expr>,
        d: impl Into<Expr>,
        a: impl Into<Expr>,
        alpha: impl Into<Expr>,
    ) -> Self {
        self.rows.push((
            frame.to_string(),
            [theta.into(), d.into(), a.into(), alpha.into()],
        ));
        self
    }

    /// Compose cumulative base-to-link transforms and finish.
    pub fn build(self) -> DhChain {
        let mut h = Ht::identity();
        let mut frames = Vec::with_capacity(self.rows.len());
        for (name, [theta, d, a, alpha]) in self.rows {
            h = &h * &Ht::from_dh_row(theta, d, a, alpha);
            frames.push((name, h.clone()));
        }
        DhChain {
            q: self.q,
            frames,
        }
    }
}

impl Default for DhChainBuilder {
    fn default() -> Self {
        Self::new()
    }
}
