//! Built-in subjects and questions so the app is useful without any external config.

use crate::domain::{Question, Subject};

pub fn seed_subjects() -> Vec<Subject> {
  vec![
    subject(
      "applied-mathematics",
      "Applied Mathematics",
      "Fundamental concepts of mathematics applied in engineering.",
      &["Algebra", "Trigonometry", "Calculus", "Differential Equations", "Probability"],
    ),
    subject(
      "basic-electronics",
      "Basic Electronics",
      "Introduction to electronic devices and circuits.",
      &["Semiconductors", "Diodes", "Transistors", "Operational Amplifiers", "Digital Logic"],
    ),
    subject(
      "programming-in-c",
      "Programming in C",
      "Learn the fundamentals of programming using the C language.",
      &["Variables & Data Types", "Control Structures", "Functions", "Arrays & Pointers", "File Handling"],
    ),
    subject(
      "management",
      "Management (22509)",
      "Principles and practices of management for technical professionals and entrepreneurs.",
      &[
        "Introduction to Management Concepts",
        "Planning and Organizing",
        "Directing and Controlling",
        "Safety Management",
        "Entrepreneurship",
        "Industrial Acts and Labour Laws",
      ],
    ),
  ]
}

/// Bank order matters: it is the canonical order of non-batched exams.
pub fn seed_questions() -> Vec<Question> {
  const LABOUR_LAWS: &str = "Industrial Acts and Labour Laws";

  vec![
    // Applied Mathematics
    question("am_q1", "applied-mathematics", "Algebra",
      "What is the value of x if 2x + 5 = 15?",
      &["3", "5", "7", "10"], "5",
      Some("2x = 15 - 5 => 2x = 10 => x = 10/2 => x = 5.")),
    question("am_q2", "applied-mathematics", "Trigonometry",
      "What is sin(90 degrees)?",
      &["0", "0.5", "1", "undefined"], "1", None),
    question("am_q3", "applied-mathematics", "Calculus",
      "What is the derivative of x^2?",
      &["x", "2x", "x^2/2", "2"], "2x", None),
    // Basic Electronics
    question("be_q1", "basic-electronics", "Semiconductors",
      "Which of these is a semiconductor?",
      &["Copper", "Silicon", "Glass", "Rubber"], "Silicon",
      Some("Silicon is a widely used semiconductor material.")),
    question("be_q2", "basic-electronics", "Diodes",
      "A diode allows current to flow in how many directions?",
      &["One", "Two", "Zero", "Four"], "One", None),
    // Programming in C
    question("pc_q1", "programming-in-c", "Variables & Data Types",
      "Which keyword is used to define a constant in C?",
      &["const", "let", "final", "static"], "const", None),
    question("pc_q2", "programming-in-c", "Control Structures",
      "What is the output of `printf(\"%d\", 10 > 5);`?",
      &["10", "5", "1", "0"], "1",
      Some("In C, true conditions evaluate to 1.")),
    // Management (22509)
    question("mgt_q1", "management", LABOUR_LAWS,
      "Indian factory act come in to force on ----------",
      &["1st May 1960", "1st April 1949", "15th August 1947", "26th January 1950"], "1st April 1949", None),
    question("mgt_q2", "management", LABOUR_LAWS,
      "As per Indian factory act, The person who has control over the affairs of factory is known as -------",
      &["Employee", "Worker", "Occupier", "None of the above"], "Occupier", None),
    question("mgt_q3", "management", LABOUR_LAWS,
      "Section 27 under the Industrial dispute act is about ........",
      &["Manufacturing process", "Penalty for instigation", "Occupier", "None of the above"], "Penalty for instigation", None),
    question("mgt_q4", "management", LABOUR_LAWS,
      "As per Indian Factory act, Employer has to provide canteen facility, if there are ---- number of employees.",
      &["50", "100", "200", "250"], "250", None),
    question("mgt_q5", "management", LABOUR_LAWS,
      "------------- section of Industrial Dispute act covers the topic penalty for instigation.",
      &["Section 7", "Section 27", "Section 5", "None of the above"], "Section 27", None),
    question("mgt_q6", "management", LABOUR_LAWS,
      "-- is not statuary welfare facility under Factory act",
      &["Canteen", "Medical", "Transport", "None of the above"], "Transport", None),
    // TODO: content review; the expected answer here is disputed (Environment Protection Act, 1986?).
    question("mgt_q7", "management", LABOUR_LAWS,
      "Bhopal gas tragedy led to an amendment under ---- legislation",
      &["Indian Safety act", "Indian boiler act", "Indian wage act", "None of the above"], "None of the above", None),
    question("mgt_q8", "management", LABOUR_LAWS,
      "Arrangements of drinking water is mentioned under------ section of Factory act",
      &["15", "11", "10", "18"], "18", None),
    // TODO: content review; penalties depend on the contravention, answer kept as curated.
    question("mgt_q9", "management", LABOUR_LAWS,
      "For contravention of provisions of factories act , the occupier shall liable for punishment up to .-------",
      &["Fine of Rs 10000", "Fine of Rs 100000", "Fine of Rs 200000", "None of the above"], "None of the above", None),
    question("mgt_q10", "management", LABOUR_LAWS,
      "The license fee can be paid to get license for a factory maximum up to --------",
      &["One year", "Two year", "Five Year", "Three year"], "Five Year", None),
  ]
}

fn subject(id: &str, name: &str, description: &str, topics: &[&str]) -> Subject {
  Subject {
    id: id.into(),
    name: name.into(),
    description: description.into(),
    topics: topics.iter().map(|t| t.to_string()).collect(),
    image: Some("https://placehold.co/600x400.png".into()),
  }
}

fn question(
  id: &str,
  subject_id: &str,
  topic: &str,
  text: &str,
  options: &[&str],
  correct_answer: &str,
  explanation: Option<&str>,
) -> Question {
  Question {
    id: id.into(),
    subject_id: subject_id.into(),
    topic: topic.into(),
    text: text.into(),
    options: options.iter().map(|o| o.to_string()).collect(),
    correct_answer: correct_answer.into(),
    explanation: explanation.map(Into::into),
  }
}
