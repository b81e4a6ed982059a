//! SQLite schema definition.

/// Complete database schema for the clinic service.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,
    cpf TEXT NOT NULL UNIQUE,                    -- 11 normalized digits
    full_name TEXT NOT NULL,
    birth_date TEXT,
    email TEXT,
    phone TEXT,
    clinical_notes TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(full_name);

-- ============================================================================
-- Catalog
-- ============================================================================

CREATE TABLE IF NOT EXISTS medications (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS treatments (
    id TEXT PRIMARY KEY,
    medication_id TEXT NOT NULL REFERENCES medications(id),
    unit TEXT NOT NULL,
    price TEXT                                   -- decimal string, NULL when unpriced
);

-- ============================================================================
-- Sessions (one clinic visit)
-- ============================================================================

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    status TEXT NOT NULL
        CHECK (status IN ('scheduled', 'waiting', 'in_attendance', 'completed')),
    check_in_time TEXT,
    weight REAL,
    signature_url TEXT,
    attended_by TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_patient ON sessions(patient_id, created_at);
CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions(status);

-- ============================================================================
-- Treatment Packages
-- ============================================================================

CREATE TABLE IF NOT EXISTS patient_packages (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    treatment_id TEXT NOT NULL REFERENCES treatments(id),
    total_amount INTEGER NOT NULL CHECK (total_amount > 0),       -- thousandths of a unit
    remaining_amount INTEGER NOT NULL,                            -- thousandths of a unit
    purchase_date TEXT NOT NULL,
    frequency_in_days INTEGER,
    suggested_day_of_week INTEGER
        CHECK (suggested_day_of_week IS NULL OR suggested_day_of_week BETWEEN 1 AND 7),
    CHECK (remaining_amount >= 0 AND remaining_amount <= total_amount)
);

CREATE INDEX IF NOT EXISTS idx_packages_patient ON patient_packages(patient_id);

-- ============================================================================
-- Clinical Acts (Append-Only)
-- ============================================================================

CREATE TABLE IF NOT EXISTS applications (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES sessions(id),
    patient_package_id TEXT NOT NULL REFERENCES patient_packages(id),
    amount_applied INTEGER NOT NULL CHECK (amount_applied > 0),   -- thousandths of a unit
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_applications_package
    ON applications(patient_package_id, created_at);
CREATE INDEX IF NOT EXISTS idx_applications_session ON applications(session_id);

CREATE TABLE IF NOT EXISTS adhoc_applications (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES sessions(id),
    treatment_id TEXT,
    treatment_name TEXT NOT NULL,
    treatment_unit TEXT NOT NULL,
    amount_applied INTEGER NOT NULL CHECK (amount_applied > 0),   -- thousandths of a unit
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_adhoc_session ON adhoc_applications(session_id);

-- ============================================================================
-- Financial Ledger (Append-Only)
-- ============================================================================

CREATE TABLE IF NOT EXISTS financial_ledger (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    entry_type TEXT NOT NULL CHECK (entry_type IN ('charge', 'payment')),
    amount TEXT NOT NULL,                        -- decimal string, charges > 0, payments < 0
    description TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_ledger_patient ON financial_ledger(patient_id, created_at);

CREATE TABLE IF NOT EXISTS payment_methods (
    id TEXT PRIMARY KEY,
    ledger_id TEXT NOT NULL REFERENCES financial_ledger(id) ON DELETE CASCADE,
    method TEXT NOT NULL,
    amount_paid TEXT NOT NULL,
    installments INTEGER NOT NULL DEFAULT 1 CHECK (installments >= 1)
);

CREATE INDEX IF NOT EXISTS idx_payment_methods_ledger ON payment_methods(ledger_id);

-- Ledger rows are immutable once written
CREATE TRIGGER IF NOT EXISTS financial_ledger_no_update BEFORE UPDATE ON financial_ledger
BEGIN
    SELECT RAISE(ABORT, 'Ledger entries are append-only');
END;

-- ============================================================================
-- Pending Submissions (Staging Area - Mutable until submitted)
-- ============================================================================

CREATE TABLE IF NOT EXISTS pending_submissions (
    draft_id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id),
    session_id TEXT,
    weight REAL,
    applications TEXT NOT NULL DEFAULT '[]',     -- JSON array of PackageDose
    adhoc_applications TEXT NOT NULL DEFAULT '[]', -- JSON array of AdhocDose
    status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'submitted')),
    fingerprint TEXT,
    outcome TEXT,                                -- JSON BatchReport once submitted
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_drafts_patient ON pending_submissions(patient_id, status);
"#;
