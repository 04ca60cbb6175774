//! Checks that run on a design before any inference.
use super::error::{ValidationError, ValidationErrorType};
use crate::graph::{DesignGraph, EdgeSelector};
use crate::variables::{VariableId, VariableRegistry};

/// Collects every design-validity error instead of stopping at the first one.
pub struct DesignValidator<'a> {
    registry: &'a VariableRegistry,
    /// The normalized graph, so repeated measures count as associations.
    graph: &'a DesignGraph,
}

impl<'a> DesignValidator<'a> {
    pub fn new(registry: &'a VariableRegistry, graph: &'a DesignGraph) -> Self {
        Self { registry, graph }
    }

    /// # Returns
    /// - `Ok(())` if the design is valid.
    /// - `Err(Vec<ValidationError>)` with one entry per offending variable pair.
    pub fn validate(&self, dv: VariableId, ivs: &[VariableId]) -> Result<(), Vec<ValidationError>> {
        let conceptual = self.graph.get_conceptual_subgraph();
        let causal = self.graph.get_causal_subgraph();
        let mut errors = Vec::new();

        for &iv in ivs {
            if !conceptual.has_path(iv, dv) {
                errors.push(self.error(
                    iv,
                    dv,
                    ValidationErrorType::NoPathToDependent,
                    format!(
                        "'{}' has no cause or associate path to the dependent variable '{}'",
                        self.registry.name_of(iv),
                        self.registry.name_of(dv)
                    ),
                ));
            }
            if causal.has_path(dv, iv) {
                errors.push(self.error(
                    dv,
                    iv,
                    ValidationErrorType::DependentReachesIndependent,
                    format!(
                        "The dependent variable '{}' causes the independent variable '{}'",
                        self.registry.name_of(dv),
                        self.registry.name_of(iv)
                    ),
                ));
            }
        }

        // No direct cause of the DV may sit downstream of it. IVs are already covered above.
        for cause in causal.get_predecessors(dv, EdgeSelector::All) {
            if ivs.contains(&cause) {
                continue;
            }
            if cause == dv || causal.has_path(dv, cause) {
                errors.push(self.error(
                    cause,
                    dv,
                    ValidationErrorType::FeedbackIntoDependent,
                    format!(
                        "'{}' causes the dependent variable '{}' but is also caused by it",
                        self.registry.name_of(cause),
                        self.registry.name_of(dv)
                    ),
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn error(&self, variable: VariableId, other: VariableId, error_type: ValidationErrorType, message: String) -> ValidationError {
        ValidationError {
            variable,
            variable_name: self.registry.name_of(variable).to_string(),
            other,
            other_name: self.registry.name_of(other).to_string(),
            error_type,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeType;

    #[test]
    fn test_self_loop_on_dv_is_feedback() {
        let mut reg = VariableRegistry::new();
        let dv = reg.add_numeric("dv").unwrap();
        let x = reg.add_numeric("x").unwrap();
        let mut g = DesignGraph::new();
        let (dv_var, x_var) = (reg.get(dv).unwrap().clone(), reg.get(x).unwrap().clone());
        g.add_edge(&x_var, &dv_var, EdgeType::Cause, None);
        g.add_edge(&dv_var, &dv_var, EdgeType::Cause, None);

        let errors = DesignValidator::new(&reg, &g).validate(dv, &[x]).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_type, ValidationErrorType::FeedbackIntoDependent);
        assert_eq!((errors[0].variable, errors[0].other), (dv, dv));
    }

    #[test]
    fn test_acyclic_design_passes() {
        let mut reg = VariableRegistry::new();
        let dv = reg.add_numeric("dv").unwrap();
        let x = reg.add_numeric("x").unwrap();
        let z = reg.add_numeric("z").unwrap();
        let mut g = DesignGraph::new();
        let var = |id| reg.get(id).unwrap().clone();
        g.add_edge(&var(x), &var(dv), EdgeType::Cause, None);
        g.add_edge(&var(z), &var(dv), EdgeType::Cause, None);
        g.add_edge(&var(z), &var(x), EdgeType::Cause, None);

        assert!(DesignValidator::new(&reg, &g).validate(dv, &[x]).is_ok());
    }
}
