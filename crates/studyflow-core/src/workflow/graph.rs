//! The compiled step graph of a learning session.
//!
//! Five step nodes, one human-review node that execution is interrupted
//! before, and one conditional edge out of feedback. The graph is built once
//! and never mutated.

use std::collections::{HashMap, HashSet, VecDeque};

use studyflow_types::session::StepName;

/// A node in the step graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    Plan,
    Retrieve,
    GenerateQuiz,
    /// Suspension point: reaching it pauses the session.
    HumanReview,
    Grade,
    Feedback,
    End,
}

impl Node {
    /// The step function executed at this node, if any.
    pub fn step(&self) -> Option<StepName> {
        match self {
            Node::Plan => Some(StepName::Planner),
            Node::Retrieve => Some(StepName::Retrieval),
            Node::GenerateQuiz => Some(StepName::QuizGenerator),
            Node::Grade => Some(StepName::Grading),
            Node::Feedback => Some(StepName::Feedback),
            Node::HumanReview | Node::End => None,
        }
    }

    pub fn for_step(step: StepName) -> Self {
        match step {
            StepName::Planner => Node::Plan,
            StepName::Retrieval => Node::Retrieve,
            StepName::QuizGenerator => Node::GenerateQuiz,
            StepName::Grading => Node::Grade,
            StepName::Feedback => Node::Feedback,
        }
    }
}

/// Outgoing edge of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Next(Node),
    /// Resolved by the routing function.
    Route { retry: Node, end: Node },
}

impl Edge {
    fn targets(&self) -> Vec<Node> {
        match *self {
            Edge::Next(n) => vec![n],
            Edge::Route { retry, end } => vec![retry, end],
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("node {0:?} has no outgoing edge")]
    MissingEdge(Node),

    #[error("node {0:?} is unreachable from the entry node")]
    Unreachable(Node),

    #[error("interrupt node {0:?} must not run a step")]
    InterruptRunsStep(Node),
}

#[derive(Debug, Clone)]
pub struct StepGraph {
    entry: Node,
    interrupt_before: Node,
    edges: HashMap<Node, Edge>,
}

impl StepGraph {
    /// `Plan -> Retrieve -> GenerateQuiz -> [HumanReview] -> Grade -> Feedback -> (GenerateQuiz | End)`.
    pub fn study_session() -> Self {
        let edges = HashMap::from([
            (Node::Plan, Edge::Next(Node::Retrieve)),
            (Node::Retrieve, Edge::Next(Node::GenerateQuiz)),
            (Node::GenerateQuiz, Edge::Next(Node::HumanReview)),
            (Node::HumanReview, Edge::Next(Node::Grade)),
            (Node::Grade, Edge::Next(Node::Feedback)),
            (
                Node::Feedback,
                Edge::Route {
                    retry: Node::GenerateQuiz,
                    end: Node::End,
                },
            ),
        ]);

        Self {
            entry: Node::Plan,
            interrupt_before: Node::HumanReview,
            edges,
        }
    }

    pub fn entry(&self) -> Node {
        self.entry
    }

    pub fn interrupt_node(&self) -> Node {
        self.interrupt_before
    }

    pub fn edge(&self, node: Node) -> Result<Edge, GraphError> {
        self.edges
            .get(&node)
            .copied()
            .ok_or(GraphError::MissingEdge(node))
    }

    /// Where execution continues after answers arrive at the interrupt node.
    pub fn resume_target(&self) -> Result<Node, GraphError> {
        match self.edge(self.interrupt_before)? {
            Edge::Next(node) => Ok(node),
            Edge::Route { .. } => Err(GraphError::MissingEdge(self.interrupt_before)),
        }
    }

    /// Check that every non-terminal node has an edge and is reachable.
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.interrupt_before.step().is_some() {
            return Err(GraphError::InterruptRunsStep(self.interrupt_before));
        }

        let mut seen = HashSet::from([self.entry]);
        let mut queue = VecDeque::from([self.entry]);
        while let Some(node) = queue.pop_front() {
            if node == Node::End {
                continue;
            }
            for target in self.edge(node)?.targets() {
                if seen.insert(target) {
                    queue.push_back(target);
                }
            }
        }

        for node in self.edges.keys() {
            if !seen.contains(node) {
                return Err(GraphError::Unreachable(*node));
            }
        }
        if !seen.contains(&Node::End) {
            return Err(GraphError::Unreachable(Node::End));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn study_session_graph_is_valid() {
        let graph = StepGraph::study_session();
        assert_eq!(graph.validate(), Ok(()));
        assert_eq!(graph.entry(), Node::Plan);
        assert_eq!(graph.interrupt_node(), Node::HumanReview);
        assert_eq!(graph.resume_target(), Ok(Node::Grade));
    }

    #[test]
    fn feedback_routes_back_to_quiz() {
        let graph = StepGraph::study_session();
        assert_eq!(
            graph.edge(Node::Feedback),
            Ok(Edge::Route {
                retry: Node::GenerateQuiz,
                end: Node::End
            })
        );
        assert_eq!(graph.edge(Node::End), Err(GraphError::MissingEdge(Node::End)));
    }

    #[test]
    fn missing_edge_detected() {
        let mut graph = StepGraph::study_session();
        graph.edges.remove(&Node::Grade);
        assert_eq!(graph.validate(), Err(GraphError::MissingEdge(Node::Grade)));
    }

    #[test]
    fn unreachable_node_detected() {
        let mut graph = StepGraph::study_session();
        graph.edges.insert(Node::Retrieve, Edge::Next(Node::HumanReview));
        graph.edges.insert(Node::Feedback, Edge::Next(Node::End));
        assert_eq!(
            graph.validate(),
            Err(GraphError::Unreachable(Node::GenerateQuiz))
        );
    }

    #[test]
    fn node_step_mapping_round_trips() {
        for step in [
            StepName::Planner,
            StepName::Retrieval,
            StepName::QuizGenerator,
            StepName::Grading,
            StepName::Feedback,
        ] {
            assert_eq!(Node::for_step(step).step(), Some(step));
        }
        assert_eq!(Node::HumanReview.step(), None);
    }
}
