//! End-to-end clinic workflow tests.

use perio_track_core::db::Database;
use perio_track_core::models::{Direction, NewPatient, PatientFile, StepStatus, StepUpdate};
use perio_track_core::{
    open_clinic_in_memory, Clinic, FfiNewPatient, FfiStepStatus, PatientStore, PerioTrackError,
};

fn new_patient(patient_id: &str, name: &str) -> NewPatient {
    NewPatient {
        patient_id: patient_id.to_string(),
        name: name.to_string(),
        birth_date: "1990-01-01".to_string(),
        profile_notes: String::new(),
    }
}

#[test]
fn test_full_treatment_workflow() {
    let mut clinic = Clinic::open(Database::open_in_memory().unwrap()).unwrap();
    clinic.sign_up("Sato", "secret-pw").unwrap();

    let id = clinic
        .register_patient(new_patient("P1", "Taro"))
        .unwrap()
        .unwrap();

    let patient = clinic.patient(&id).unwrap();
    assert_eq!(patient.plan.len(), 8);
    assert_eq!(patient.plan.steps()[0].status, StepStatus::InProgress);
    assert!(patient.plan.steps()[1..]
        .iter()
        .all(|s| s.status == StepStatus::Pending));
    assert_eq!(patient.plan.progress_percent(), 0);

    let first = patient.plan.steps()[0].id.clone();
    let second = patient.plan.steps()[1].id.clone();

    clinic
        .update_step(&id, &first, StepUpdate::status(StepStatus::Completed))
        .unwrap();
    clinic
        .update_step(&id, &second, StepUpdate::status(StepStatus::InProgress))
        .unwrap();

    let patient = clinic.patient(&id).unwrap();
    assert_eq!(patient.plan.progress_percent(), 13);
    assert_eq!(patient.plan.progress_fraction(), "1/8");
    assert_eq!(patient.current_step_label(), Some(patient.plan.steps()[1].label.as_str()));
    assert_eq!(patient.plan.default_active_step().unwrap().id, second);

    assert!(clinic.delete_patient(&id).unwrap());
    assert!(clinic.patients().is_empty());
    assert_eq!(clinic.store().count_steps().unwrap(), 0);
}

#[test]
fn test_plan_edits_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clinic.db");

    let (id, moved) = {
        let mut clinic = Clinic::open(Database::open(&path).unwrap()).unwrap();
        clinic.sign_up("Sato", "secret-pw").unwrap();
        let id = clinic
            .register_patient(new_patient("P1", "Taro"))
            .unwrap()
            .unwrap();

        let steps: Vec<String> = clinic
            .patient(&id)
            .unwrap()
            .plan
            .steps()
            .iter()
            .map(|s| s.id.clone())
            .collect();

        clinic.rename_step(&id, &steps[0], "Initial exam").unwrap();
        clinic.move_step(&id, &steps[2], Direction::Up).unwrap();
        clinic.remove_step(&id, &steps[7], None).unwrap();
        clinic
            .attach_file(
                &id,
                &steps[0],
                PatientFile::image("xray.jpg", "data:image/jpeg;base64,AAAA"),
            )
            .unwrap();
        (id, steps[2].clone())
    };

    let clinic = Clinic::open(Database::open(&path).unwrap()).unwrap();
    let patient = clinic.patient(&id).unwrap();
    assert_eq!(patient.plan.len(), 7);
    assert_eq!(patient.plan.steps()[0].label, "Initial exam");
    assert_eq!(patient.plan.steps()[1].id, moved);
    assert_eq!(patient.plan.steps()[0].files.len(), 1);
    assert_eq!(patient.plan.steps()[0].updated_by.as_deref(), Some("Sato"));

    // Session is not persisted
    assert!(clinic.current_staff().is_none());
}

#[test]
fn test_delete_cascades_steps_and_files() {
    let mut clinic = Clinic::open(Database::open_in_memory().unwrap()).unwrap();
    clinic.sign_up("Sato", "secret-pw").unwrap();

    let taro = clinic
        .register_patient(new_patient("P1", "Taro"))
        .unwrap()
        .unwrap();
    let hanako = clinic
        .register_patient(new_patient("P2", "Hanako"))
        .unwrap()
        .unwrap();

    let step = clinic.patient(&taro).unwrap().plan.steps()[0].id.clone();
    clinic
        .attach_file(&taro, &step, PatientFile::image("a.jpg", "data:image/png;base64,AA"))
        .unwrap();
    assert_eq!(clinic.store().count_steps().unwrap(), 16);
    assert_eq!(clinic.store().count_files().unwrap(), 1);

    clinic.delete_patient(&taro).unwrap();
    assert_eq!(clinic.store().count_steps().unwrap(), 8);
    assert_eq!(clinic.store().count_files().unwrap(), 0);

    let remaining = clinic.store().load().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, hanako);
}

#[test]
fn test_last_step_cannot_be_removed() {
    let mut clinic = Clinic::open(Database::open_in_memory().unwrap()).unwrap();
    clinic.sign_up("Sato", "secret-pw").unwrap();
    let id = clinic
        .register_patient(new_patient("P1", "Taro"))
        .unwrap()
        .unwrap();

    let steps: Vec<String> = clinic
        .patient(&id)
        .unwrap()
        .plan
        .steps()
        .iter()
        .map(|s| s.id.clone())
        .collect();
    for step in &steps[1..] {
        assert!(clinic.remove_step(&id, step, None).unwrap().is_some());
    }

    assert!(clinic.remove_step(&id, &steps[0], None).unwrap().is_none());
    assert_eq!(clinic.patient(&id).unwrap().plan.len(), 1);
}

#[test]
fn test_ffi_workflow() {
    let core = open_clinic_in_memory().unwrap();

    let err = core
        .register_patient(FfiNewPatient {
            patient_id: "P1".into(),
            name: "Taro".into(),
            birth_date: "1990-01-01".into(),
            profile_notes: String::new(),
        })
        .unwrap_err();
    assert!(matches!(err, PerioTrackError::NotAuthenticated(_)));

    core.sign_up("Sato".into(), "secret-pw".into()).unwrap();
    let id = core
        .register_patient(FfiNewPatient {
            patient_id: "P1".into(),
            name: "Taro".into(),
            birth_date: "1990-01-01".into(),
            profile_notes: "Diabetic".into(),
        })
        .unwrap()
        .unwrap();

    let patient = core.get_patient(id.clone()).unwrap().unwrap();
    assert_eq!(patient.steps.len(), 8);
    assert_eq!(patient.steps[0].status, FfiStepStatus::InProgress);
    assert_eq!(patient.progress, "0/8");

    let first = patient.steps[0].id.clone();
    assert!(core
        .update_step(id.clone(), first.clone(), Some(FfiStepStatus::Completed), Some("done".into()))
        .unwrap());

    let patient = core.get_patient(id.clone()).unwrap().unwrap();
    assert_eq!(patient.progress_percent, 13);
    assert_eq!(patient.steps[0].notes, "done");
    assert_eq!(patient.steps[0].updated_by.as_deref(), Some("Sato"));

    // Unknown selection falls back to the first step while nothing is in progress
    assert_eq!(
        core.active_step(id.clone(), Some("missing".into())).unwrap(),
        Some(patient.steps[0].id.clone())
    );

    assert_eq!(core.search_patients("Tar".into()).unwrap().len(), 1);
    assert!(core.delete_patient(id).unwrap());
    assert!(core.list_patients().unwrap().is_empty());
}

#[test]
fn test_ffi_login_rejects_wrong_password() {
    let core = open_clinic_in_memory().unwrap();
    core.sign_up("Sato".into(), "secret-pw".into()).unwrap();
    core.log_out().unwrap();
    assert!(core.current_staff().unwrap().is_none());

    let err = core.log_in("Sato".into(), "wrong".into()).unwrap_err();
    assert!(matches!(err, PerioTrackError::AuthError(_)));

    let session = core.log_in("Sato".into(), "secret-pw".into()).unwrap();
    assert_eq!(session.name, "Sato");
}

#[test]
fn test_ffi_advice_without_key_is_configuration_error() {
    let core = open_clinic_in_memory().unwrap();
    core.sign_up("Sato".into(), "secret-pw".into()).unwrap();
    let id = core
        .register_patient(FfiNewPatient {
            patient_id: "P1".into(),
            name: "Taro".into(),
            birth_date: String::new(),
            profile_notes: String::new(),
        })
        .unwrap()
        .unwrap();
    let step = core.get_patient(id.clone()).unwrap().unwrap().steps[0].id.clone();

    let err = core.request_advice(id, step).unwrap_err();
    assert!(matches!(err, PerioTrackError::AdvisorConfiguration(_)));
}

#[test]
fn test_ffi_remove_selected_step_selects_first_step() {
    let core = open_clinic_in_memory().unwrap();
    core.sign_up("Sato".into(), "secret-pw".into()).unwrap();
    let id = core
        .register_patient(FfiNewPatient {
            patient_id: "P1".into(),
            name: "Taro".into(),
            birth_date: String::new(),
            profile_notes: String::new(),
        })
        .unwrap()
        .unwrap();
    let steps = core.get_patient(id.clone()).unwrap().unwrap().steps;

    core.update_step(id.clone(), steps[0].id.clone(), Some(FfiStepStatus::Completed), None)
        .unwrap();
    core.update_step(id.clone(), steps[2].id.clone(), Some(FfiStepStatus::InProgress), None)
        .unwrap();

    let next = core
        .remove_step(id.clone(), steps[1].id.clone(), Some(steps[1].id.clone()))
        .unwrap();
    assert_eq!(next, Some(steps[0].id.clone()));
    assert_eq!(core.get_patient(id).unwrap().unwrap().steps.len(), 7);
}

#[test]
fn test_ffi_malformed_backup_is_serialization_error() {
    let core = open_clinic_in_memory().unwrap();
    core.sign_up("Sato".into(), "secret-pw".into()).unwrap();

    let err = core.import_json("not a backup".into()).unwrap_err();
    assert!(matches!(err, PerioTrackError::SerializationError(_)));
    assert!(core.list_patients().unwrap().is_empty());
}

#[test]
fn test_ffi_import_with_repeated_id_stays_usable() {
    let source = open_clinic_in_memory().unwrap();
    source.sign_up("Sato".into(), "secret-pw".into()).unwrap();
    source
        .register_patient(FfiNewPatient {
            patient_id: "P1".into(),
            name: "Taro".into(),
            birth_date: String::new(),
            profile_notes: String::new(),
        })
        .unwrap();
    let backup: serde_json::Value = serde_json::from_str(&source.export_json().unwrap()).unwrap();
    let record = backup["patients"][0].clone();
    let doubled = serde_json::json!([record.clone(), record]).to_string();

    let core = open_clinic_in_memory().unwrap();
    core.sign_up("Sato".into(), "secret-pw".into()).unwrap();
    let report = core.import_json(doubled).unwrap();
    assert_eq!(report.added, 1);

    core.register_patient(FfiNewPatient {
        patient_id: "P2".into(),
        name: "Hanako".into(),
        birth_date: String::new(),
        profile_notes: String::new(),
    })
    .unwrap();
    assert_eq!(core.list_patients().unwrap().len(), 2);
}
