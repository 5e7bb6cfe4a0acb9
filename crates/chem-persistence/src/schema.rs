//! Esquema Diesel. Reemplazable con `diesel print-schema`.

diesel::table! {
    discovery_runs (id) {
        id -> Uuid,
        config -> Jsonb,
        config_hash -> Text,
        status -> Text,
        current_round -> Integer,
        result_set -> Nullable<Jsonb>,
        result_fingerprint -> Nullable<Text>,
        error_message -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    molecules (run_id, position) {
        run_id -> Uuid,
        position -> Integer,
        structure -> Text,
        origin_round -> Integer,
        parent -> Nullable<Text>,
        rule -> Nullable<Text>,
        descriptors -> Jsonb,
        score -> Double,
        violations -> Integer,
        discard_reason -> Nullable<Text>,
    }
}

diesel::table! {
    agent_traces (run_id, seq) {
        run_id -> Uuid,
        seq -> BigInt,
        ts -> Timestamptz,
        round -> Integer,
        agent -> Text,
        action -> Text,
        outcome -> Text,
        payload -> Jsonb,
    }
}

diesel::joinable!(molecules -> discovery_runs (run_id));
diesel::joinable!(agent_traces -> discovery_runs (run_id));

diesel::allow_tables_to_appear_in_same_query!(discovery_runs, molecules, agent_traces,);
