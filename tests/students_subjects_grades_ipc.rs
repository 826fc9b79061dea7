mod test_support;

use serde_json::json;
use test_support::{add_grade, create_subject, request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn students_crud_computes_stream_and_level() {
    let workspace = temp_dir("gradebook-students");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "studentId": "S100", "firstName": "Brian", "lastName": "Kamau", "form": "f3s" }),
    );
    let s = &created["student"];
    assert_eq!(s["form"], "F3S");
    assert_eq!(s["stream"], "SCIENCE");
    assert_eq!(s["level"], "Senior");
    assert_eq!(s["name"], "Brian Kamau");

    let defaulted = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({ "studentId": "S101", "firstName": "Cheru", "lastName": "Achieng" }),
    );
    assert_eq!(defaulted["student"]["form"], "F1");
    assert_eq!(defaulted["student"]["stream"], "NONE");

    let dup = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "students.create",
        json!({ "studentId": "S100", "firstName": "X", "lastName": "Y" }),
    );
    assert_eq!(dup, "bad_params");
    let bad_form = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "students.create",
        json!({ "studentId": "S102", "firstName": "X", "lastName": "Y", "form": "F5" }),
    );
    assert_eq!(bad_form, "bad_params");

    // Moving to a humanities form changes the computed stream.
    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "students.update",
        json!({ "studentId": "S100", "patch": { "form": "F4H" } }),
    );
    assert_eq!(updated["student"]["stream"], "HUMANITIES");

    let f4h = request_ok(&mut stdin, &mut reader, "7", "students.list", json!({ "form": "F4H" }));
    assert_eq!(f4h["students"].as_array().map(|a| a.len()), Some(1));
    let all = request_ok(&mut stdin, &mut reader, "8", "students.list", json!({}));
    assert_eq!(all["students"].as_array().map(|a| a.len()), Some(2));

    let _ = request_ok(&mut stdin, &mut reader, "9", "students.delete", json!({ "studentId": "S101" }));
    let missing = request_err(&mut stdin, &mut reader, "10", "students.get", json!({ "studentId": "S101" }));
    assert_eq!(missing, "not_found");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn subjects_list_filters_by_form_restrictions() {
    let workspace = temp_dir("gradebook-subjects");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    create_subject(&mut stdin, &mut reader, "2", json!({ "name": "English" }));
    create_subject(&mut stdin, &mut reader, "3", json!({ "name": "Physics", "stream": "SCIENCE" }));
    create_subject(&mut stdin, &mut reader, "4", json!({ "name": "History", "stream": "HUMANITIES" }));
    create_subject(&mut stdin, &mut reader, "5", json!({ "name": "Integrated Science", "stream": "JUNIOR" }));
    create_subject(&mut stdin, &mut reader, "6", json!({ "name": "Project", "formLevel": "F4" }));

    let names = |v: &serde_json::Value| -> Vec<String> {
        v["subjects"]
            .as_array()
            .expect("subjects")
            .iter()
            .filter_map(|s| s["name"].as_str().map(str::to_string))
            .collect()
    };

    let f1 = request_ok(&mut stdin, &mut reader, "7", "subjects.list", json!({ "form": "F1" }));
    assert_eq!(names(&f1), vec!["English", "Integrated Science"]);
    let f3s = request_ok(&mut stdin, &mut reader, "8", "subjects.list", json!({ "form": "F3S" }));
    assert_eq!(names(&f3s), vec!["English", "Physics"]);
    let f4h = request_ok(&mut stdin, &mut reader, "9", "subjects.list", json!({ "form": "F4H" }));
    assert_eq!(names(&f4h), vec!["English", "History", "Project"]);
    let all = request_ok(&mut stdin, &mut reader, "10", "subjects.list", json!({}));
    assert_eq!(names(&all).len(), 5);

    let bad = request_err(
        &mut stdin,
        &mut reader,
        "11",
        "subjects.create",
        json!({ "name": "Art", "stream": "ARTS" }),
    );
    assert_eq!(bad, "bad_params");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn grades_are_validated_classified_and_listed_newest_first() {
    let workspace = temp_dir("gradebook-grades");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "studentId": "J1", "firstName": "Jane", "lastName": "Mwangi", "form": "F2" }),
    );
    let math = create_subject(&mut stdin, &mut reader, "3", json!({ "name": "Mathematics" }));

    for (id, score) in [("4", json!(101)), ("5", json!(-1)), ("6", json!("abc"))] {
        let code = request_err(
            &mut stdin,
            &mut reader,
            id,
            "grades.create",
            json!({ "studentId": "J1", "subjectId": math, "term": "T1", "score": score }),
        );
        assert_eq!(code, "bad_params");
    }
    let unknown_subject = request_err(
        &mut stdin,
        &mut reader,
        "7",
        "grades.create",
        json!({ "studentId": "J1", "subjectId": "nope", "score": 50 }),
    );
    assert_eq!(unknown_subject, "not_found");

    let first = add_grade(&mut stdin, &mut reader, "8", "J1", &math, "T1", 39.999);
    assert_eq!(first["grade"]["score"], 40.0);
    assert_eq!(first["grade"]["mark"], "D");
    assert_eq!(first["grade"]["comment"], "PASS");
    assert_eq!(first["grade"]["passed"], true);

    let second = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "grades.create",
        json!({ "studentId": "J1", "subjectId": math, "term": "T1", "score": "85" }),
    );
    assert_eq!(second["grade"]["label"], "A (EXCELLENT)");
    let _ = add_grade(&mut stdin, &mut reader, "10", "J1", &math, "T2", 10.0);

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "grades.list",
        json!({ "studentId": "J1", "term": "T1" }),
    );
    let grades = listed["grades"].as_array().expect("grades");
    assert_eq!(grades.len(), 2);
    assert_eq!(grades[0]["score"], 85.0);
    assert_eq!(listed["level"], "Junior");

    let grade_id = grades[1]["id"].as_str().expect("id").to_string();
    let _ = request_ok(&mut stdin, &mut reader, "12", "grades.delete", json!({ "gradeId": grade_id }));
    let again = request_err(&mut stdin, &mut reader, "13", "grades.delete", json!({ "gradeId": grade_id }));
    assert_eq!(again, "not_found");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn classify_covers_both_scales() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let cases = [
        (json!({ "score": 80, "level": "junior" }), "A (EXCELLENT)", true),
        (json!({ "score": 39.5, "level": "junior" }), "F (FAIL)", false),
        (json!({ "score": 65, "level": "senior" }), "3 (STRONG CREDIT)", true),
        (json!({ "score": 40, "form": "F3H" }), "8 (PASS)", true),
        (json!({ "score": 39, "form": "F4S" }), "9 (FAIL)", false),
    ];
    for (i, (params, label, passed)) in cases.iter().enumerate() {
        let c = request_ok(&mut stdin, &mut reader, &format!("c{}", i), "grades.classify", params.clone());
        assert_eq!(c["label"], *label);
        assert_eq!(c["passed"], *passed);
    }

    let senior = request_ok(
        &mut stdin,
        &mut reader,
        "p",
        "grades.classify",
        json!({ "score": 55, "level": "senior" }),
    );
    assert_eq!(senior["point"], 5);

    let out_of_range = request_err(
        &mut stdin,
        &mut reader,
        "e1",
        "grades.classify",
        json!({ "score": 100.5, "level": "senior" }),
    );
    assert_eq!(out_of_range, "bad_params");
    let no_level = request_err(&mut stdin, &mut reader, "e2", "grades.classify", json!({ "score": 50 }));
    assert_eq!(no_level, "bad_params");

    drop(stdin);
    let _ = child.wait();
}
