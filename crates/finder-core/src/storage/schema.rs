pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS iterations (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  run_timestamp TEXT NOT NULL,
  submissions_fetched INTEGER NOT NULL,
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS address_counts (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  iteration_id INTEGER NOT NULL REFERENCES iterations(id),
  address TEXT NOT NULL,
  delta_count INTEGER NOT NULL,
  total_count INTEGER NOT NULL,
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS rounds (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  evaluator TEXT NOT NULL,
  started_at TEXT NOT NULL,
  completed_at TEXT,
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS evaluations (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  round_id INTEGER NOT NULL REFERENCES rounds(id),
  submission_id INTEGER NOT NULL,
  address TEXT NOT NULL,
  score INTEGER NOT NULL,
  rationale TEXT,
  evaluated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS final_scores (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  round_id INTEGER NOT NULL REFERENCES rounds(id),
  iteration_id INTEGER REFERENCES iterations(id),
  address TEXT NOT NULL,
  quality_score REAL NOT NULL,
  final_score REAL NOT NULL,
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS finders (
  address TEXT PRIMARY KEY,
  active INTEGER NOT NULL,
  has_permission INTEGER NOT NULL,
  last_active_iteration_id INTEGER REFERENCES iterations(id),
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_address_counts_iteration ON address_counts(iteration_id);
CREATE INDEX IF NOT EXISTS idx_evaluations_round ON evaluations(round_id);
CREATE INDEX IF NOT EXISTS idx_evaluations_submission ON evaluations(submission_id);
"#;
