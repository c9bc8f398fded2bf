use crate::error::StorageError;
use crate::records::NewEvaluation;
use crate::store::RecordStore;

fn demo(
    course: &str,
    evaluation: &str,
    date: &str,
    subject: &str,
    scores: [f64; 6],
    final_score: f64,
    observations: &str,
) -> NewEvaluation {
    let [structure, programming, theory, ai_usage, reflection, presentation] = scores;
    NewEvaluation {
        template: None,
        course: Some(course.into()),
        evaluation: Some(evaluation.into()),
        date: Some(date.into()),
        subject: Some(subject.into()),
        structure: Some(structure),
        programming: Some(programming),
        theory: Some(theory),
        ai_usage: Some(ai_usage),
        reflection: Some(reflection),
        presentation: Some(presentation),
        final_score: Some(final_score),
        observations: Some(observations.into()),
    }
}

/// Five sample evaluations. Criteria that do not apply are stored as 0.0.
pub fn demo_evaluations() -> Vec<NewEvaluation> {
    vec![
        demo("Matemáticas I", "Parcial 1", "2025-10-01", "Grupo A", [4.0, 4.5, 4.0, 3.5, 4.0, 4.2], 4.2, "Buen desempeño general"),
        demo("Programación", "Proyecto", "2025-10-05", "Estudiante 23", [4.5, 5.0, 3.8, 4.0, 4.1, 4.7], 4.5, "Proyecto sobresaliente"),
        demo("Inteligencia Artificial", "Tarea 2", "2025-10-12", "Grupo B", [3.5, 3.8, 4.2, 4.5, 3.9, 4.0], 3.98, "Necesita mejorar la implementación"),
        demo("Física", "Examen Final", "2025-06-20", "Estudiante 07", [4.0, 0.0, 4.8, 0.0, 4.4, 4.1], 4.3, "Muy buen manejo teórico"),
        demo("Química", "Laboratorio", "2025-09-15", "Grupo C", [3.9, 0.0, 3.7, 0.0, 3.8, 3.9], 3.83, "Resultados esperados, documentar más"),
    ]
}

/// Insert the demo evaluations, returning their ids. Individual failures are
/// logged; only a run where nothing was inserted is an error.
pub fn seed_demo(store: &dyn RecordStore) -> Result<Vec<i64>, StorageError> {
    let mut ids = Vec::new();
    for item in demo_evaluations() {
        match store.insert(&item) {
            Ok(id) => ids.push(id),
            Err(e) => tracing::warn!("Demo evaluation for {:?} not inserted: {e}", item.subject),
        }
    }
    if ids.is_empty() {
        return Err(StorageError::new("seed demo", "no demo evaluations could be inserted"));
    }
    tracing::info!("Inserted {} demo evaluations", ids.len());
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::records::{DetailFilter, SortOrder};
    use std::time::Duration;

    #[test]
    fn seeds_five_records() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("rubrica.db"), Duration::from_secs(5), dir.path());
        db.initialize().unwrap();

        let ids = seed_demo(&db).unwrap();
        assert_eq!(ids.len(), 5);

        let summary = db.list_summary(SortOrder::Desc).unwrap();
        assert_eq!(summary[0].date.as_deref(), Some("2025-10-12"));

        let hits = db
            .list_detail(&DetailFilter {
                text: Some("mejorar".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].subject.as_deref(), Some("Grupo B"));
    }

    #[test]
    fn fails_when_nothing_inserted() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let db = Database::new(blocker.join("rubrica.db"), Duration::from_secs(1), dir.path());

        let err = seed_demo(&db).unwrap_err();
        assert_eq!(err.operation, "seed demo");
    }
}
