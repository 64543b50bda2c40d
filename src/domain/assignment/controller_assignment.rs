use rand::Rng;
use rand::seq::IndexedRandom;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::domain::assignment::hypervisor_assignment::HypervisorAssignment;
use crate::domain::coverage::quartets::QuartetIndex;
use crate::domain::graph::Vertex;
use crate::domain::request::VsdnRequest;
use crate::error::{Error, Result};

/// Which admissible controller location a new request gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerSelection {
    #[default]
    Random,
    /// The location with the most quartets overall.
    MaxTotalHpair,
}

impl FromStr for ControllerSelection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "random" => Ok(ControllerSelection::Random),
            "max-total-hpair" | "max total hpair" => Ok(ControllerSelection::MaxTotalHpair),
            _ => Err(Error::UnknownAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for ControllerSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerSelection::Random => write!(f, "random"),
            ControllerSelection::MaxTotalHpair => write!(f, "max-total-hpair"),
        }
    }
}

/// Controllers that reach every switch of the request through the pair each switch is assigned to.
pub fn find_possible_controllers(switches: &[Vertex], assignment: &HypervisorAssignment, quartets: &QuartetIndex, controllers: &[Vertex]) -> BTreeSet<Vertex> {
    let mut possible: BTreeSet<Vertex> = controllers.iter().copied().collect();
    for &s in switches {
        let Some(pair) = assignment.pair(s) else {
            return BTreeSet::new();
        };
        let admitted = quartets.admitted_controllers(pair, s);
        possible.retain(|c| admitted.contains(c));
        if possible.is_empty() {
            break;
        }
    }
    possible
}

/// Keeps the request's current controller when it is admissible, otherwise picks one.
pub fn select_controller<R: Rng + ?Sized>(request: &VsdnRequest, possible: &BTreeSet<Vertex>, selection: ControllerSelection, quartets: &QuartetIndex, rng: &mut R) -> Option<Vertex> {
    if let Some(c) = request.controller
        && possible.contains(&c)
    {
        return Some(c);
    }

    match selection {
        ControllerSelection::Random => {
            let options: Vec<Vertex> = possible.iter().copied().collect();
            options.choose(rng).copied()
        }
        // BTreeSet order plus a strict comparison keeps the smallest index on ties.
        ControllerSelection::MaxTotalHpair => possible.iter().copied().fold(None, |best: Option<Vertex>, c| match best {
            Some(b) if quartets.for_controller(b).len() >= quartets.for_controller(c).len() => Some(b),
            _ => Some(c),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::coverage::quartets::{HypervisorPair, Quartet};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn quartet(c: Vertex, h: Vertex, h2: Vertex, s: Vertex) -> Quartet {
        Quartet { controller: c, pair: HypervisorPair::new(h, h2), switch: s }
    }

    #[test]
    fn test_previous_controller_is_kept() {
        let quartets = QuartetIndex::from_quartets(vec![quartet(0, 1, 2, 3), quartet(4, 1, 2, 3), quartet(4, 1, 2, 5), quartet(0, 1, 2, 6), quartet(4, 1, 2, 6)]);
        let possible: BTreeSet<Vertex> = [0, 4].into_iter().collect();
        let request = VsdnRequest::new(vec![3, 6], 1, 0).unwrap().with_controller(0);
        let mut rng = StdRng::seed_from_u64(11);

        assert_eq!(select_controller(&request, &possible, ControllerSelection::MaxTotalHpair, &quartets, &mut rng), Some(0));

        let fresh = VsdnRequest::new(vec![3, 6], 1, 0).unwrap();
        assert_eq!(select_controller(&fresh, &possible, ControllerSelection::MaxTotalHpair, &quartets, &mut rng), Some(4));
        assert_eq!(select_controller(&fresh, &BTreeSet::new(), ControllerSelection::Random, &quartets, &mut rng), None);
    }
}
