use rusqlite::Connection;

pub fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS evaluaciones (
            id                 INTEGER PRIMARY KEY AUTOINCREMENT,
            plantilla          TEXT,
            curso              TEXT,
            evaluacion         TEXT,
            fecha              TEXT,
            grupo_o_estudiante TEXT,
            estructura         REAL,
            programacion       REAL,
            teoria             REAL,
            ia                 REAL,
            reflexion          REAL,
            presentacion       REAL,
            nota_final         REAL,
            observaciones      TEXT,
            created_at         TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX IF NOT EXISTS idx_evaluaciones_fecha ON evaluaciones(fecha);
        CREATE INDEX IF NOT EXISTS idx_evaluaciones_natural_key
            ON evaluaciones(curso, evaluacion, fecha, grupo_o_estudiante);
        ",
    )?;
    Ok(())
}
