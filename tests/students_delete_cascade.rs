mod common;

use common::spawn_sidecar;
use serde_json::json;

#[test]
fn deleting_student_removes_grades_and_clears_profile_link() {
    let mut sc = spawn_sidecar(&[]);
    sc.select_workspace("educonnect-cascade");
    sc.sign_up_and_in("prof@escola.org", "teacher");

    let class_id = sc.create_class("9A");
    let ana = sc.create_student(&class_id, "Ana Silva", "20248937");
    let bruno = sc.create_student(&class_id, "Bruno Costa", "20240001");
    sc.add_grade(&ana, 7.0, "2026-03-01");
    sc.add_grade(&ana, 9.0, "2026-03-02");
    sc.add_grade(&bruno, 5.0, "2026-03-01");

    let provisioned = sc.request_ok("auth.provisionStudentAccounts", json!({}));
    assert_eq!(provisioned["created"].as_array().map(Vec::len), Some(2));

    let deleted = sc.request_ok("students.delete", json!({ "studentId": ana }));
    assert_eq!(deleted["gradesDeleted"], json!(2));

    let grades = sc.request_ok("grades.list", json!({ "classId": class_id }));
    let left = grades["grades"].as_array().expect("grades");
    assert_eq!(left.len(), 1);
    assert_eq!(left[0]["studentId"], json!(bruno));

    let missing = sc.request_err("students.history", json!({ "studentId": ana }));
    assert_eq!(missing["code"], json!("not_found"));

    // The provisioned account survives but no longer points at a record.
    sc.request_ok("auth.signOut", json!({}));
    sc.request_ok(
        "auth.signIn",
        json!({ "email": "20248937@educonnect.com", "password": "123456" }),
    );
    let card = sc.request_ok("reportCard.get", json!({}));
    assert_eq!(card["linked"], json!(false));
    sc.shutdown();
}

#[test]
fn deleting_unknown_student_is_not_found_and_class_delete_is_guarded() {
    let mut sc = spawn_sidecar(&[]);
    sc.select_workspace("educonnect-cascade-guard");
    sc.sign_up_and_in("prof@escola.org", "teacher");

    let err = sc.request_err("students.delete", json!({ "studentId": "ghost" }));
    assert_eq!(err["code"], json!("not_found"));
    assert_eq!(err["details"]["surface"], json!("notification"));

    let class_id = sc.create_class("9A");
    let ana = sc.create_student(&class_id, "Ana Silva", "20248937");
    let blocked = sc.request_err("classes.delete", json!({ "classId": class_id }));
    assert_eq!(blocked["code"], json!("constraint_violation"));

    sc.request_ok("students.assignClass", json!({ "studentId": ana, "classId": null }));
    sc.request_ok("classes.delete", json!({ "classId": class_id }));
    let unassigned = sc.request_ok("students.list", json!({ "unassigned": true }));
    assert_eq!(unassigned["students"].as_array().map(Vec::len), Some(1));
    sc.shutdown();
}
