use super::{Criterion, Weights};

/// A named rubric: one weight (integer percent) and one description per criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RubricTemplate {
    pub name: &'static str,
    /// Ordered as [`Criterion::ALL`].
    weights: [u32; 6],
    descriptions: [&'static str; 6],
}

impl RubricTemplate {
    pub fn weights(&self) -> Weights {
        Criterion::ALL.into_iter().zip(self.weights).collect()
    }

    pub fn weight(&self, criterion: Criterion) -> u32 {
        self.weights[Self::slot(criterion)]
    }

    pub fn description(&self, criterion: Criterion) -> &'static str {
        self.descriptions[Self::slot(criterion)]
    }

    fn slot(criterion: Criterion) -> usize {
        Criterion::ALL
            .iter()
            .position(|c| *c == criterion)
            .unwrap_or_default()
    }
}

/// Built-in templates. The first entry is the default and the fallback.
pub static TEMPLATES: [RubricTemplate; 3] = [
    RubricTemplate {
        name: "Agroindustrial",
        weights: [15, 20, 15, 10, 15, 25],
        descriptions: [
            "Claridad y organización de la solución",
            "Calidad del código y solución técnica",
            "Dominio de los conceptos teóricos",
            "Aplicación de técnicas de IA (si aplica)",
            "Capacidad de autoevaluación y reflexión",
            "Calidad de la presentación y entrega",
        ],
    },
    RubricTemplate {
        name: "Civil",
        weights: [20, 10, 20, 5, 15, 30],
        descriptions: [
            "Diseño y coherencia estructural",
            "Implementación de modelos/algoritmos (si aplica)",
            "Dominio de principios teóricos",
            "Uso de técnicas avanzadas (cuando aplicable)",
            "Evaluación crítica del trabajo",
            "Claridad en planos y presentaciones",
        ],
    },
    RubricTemplate {
        name: "Estadística",
        weights: [10, 20, 25, 15, 10, 20],
        descriptions: [
            "Organización del análisis estadístico",
            "Calidad de scripts y reproducibilidad",
            "Aplicación de fundamentos estadísticos",
            "Uso de métodos de aprendizaje (si aplica)",
            "Interpretación y discusión de resultados",
            "Claridad en visualizaciones y reportes",
        ],
    },
];

pub fn default_template() -> &'static RubricTemplate {
    &TEMPLATES[0]
}

/// Look up a template by exact name. Unknown names resolve to the first
/// template instead of failing.
pub fn resolve_template(name: &str) -> &'static RubricTemplate {
    match TEMPLATES.iter().find(|t| t.name == name) {
        Some(template) => template,
        None => {
            tracing::debug!("Unknown rubric template '{name}', using {}", default_template().name);
            default_template()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_template() {
        let t = resolve_template("Estadística");
        assert_eq!(t.name, "Estadística");
        assert_eq!(t.weight(Criterion::Teoria), 25);
        assert_eq!(t.description(Criterion::Presentacion), "Claridad en visualizaciones y reportes");
    }

    #[test]
    fn unknown_name_falls_back_to_first() {
        let t = resolve_template("Medicina");
        assert_eq!(t.name, "Agroindustrial");
        assert_eq!(t.weights(), default_template().weights());

        // Lookup is exact, not case-insensitive.
        assert_eq!(resolve_template("civil").name, "Agroindustrial");
        assert_eq!(resolve_template("").name, "Agroindustrial");
    }

    #[test]
    fn default_weights_match_agroindustrial() {
        let w = default_template().weights();
        let expected = [15, 20, 15, 10, 15, 25];
        for (criterion, weight) in Criterion::ALL.into_iter().zip(expected) {
            assert_eq!(w[&criterion], weight);
        }
    }

    #[test]
    fn every_template_sums_to_100() {
        for t in &TEMPLATES {
            assert_eq!(t.weights().values().sum::<u32>(), 100, "{}", t.name);
        }
    }
}
