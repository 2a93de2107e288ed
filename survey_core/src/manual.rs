/*!

This is the long-form manual for `survey_core` and `svyan`.

## Input documents

Two documents are needed to build an engine: a schema document describing
the questions, and a response document with the collected records.

### Schema document

A JSON object with a `questions` mapping. The order of the mapping defines
the order in which questions are listed and analyzed.

```text
{
  "questions": {
    "respondent_id": { "question": "Id", "type": "identifier" },
    "role": {
      "question": "What is your professional role?",
      "type": "single_choice",
      "options": ["Designer", "Artist", "Programmer"]
    },
    "engines": {
      "question": "Which engines do you use?",
      "type": "multiple_choice",
      "options": ["Unity", "Unreal", "Godot"],
      "has_other": true
    },
    "tools": {
      "question": "Rate your experience with these tools",
      "type": "matrix",
      "items": ["Houdini", "Blender"],
      "scale": ["None", "Some", "A lot"]
    },
    "features": {
      "question": "Rank the features you want most",
      "type": "ranking",
      "options": ["Previews", "Debugging", "Patterns"],
      "max_selections": 3
    },
    "feedback": { "question": "Anything else?", "type": "open_text" }
  }
}
```

Supported types: `identifier`, `single_choice`, `multiple_choice`,
`matrix`, `ranking`, `open_text`.

### Response document

A JSON array of flat records. Each record maps question ids to answers;
the expected answer shape follows from the declared question type:

* `single_choice`, `open_text`: a string.
* `multiple_choice`: an array of strings.
* `matrix`: an object mapping item to scale label.
* `ranking`: either an ordered array of option names (most preferred
  first) or an object mapping option name to its 1-based rank.

```text
[
  {
    "respondent_id": "1",
    "role": "Designer",
    "engines": ["Unity", "Godot"],
    "tools": { "Houdini": "Some", "Blender": "A lot" },
    "features": ["Debugging", "Previews"],
    "feedback": "More docs please"
  }
]
```

Answers whose shape does not match the declared type are skipped with a
log message; absent and blank answers are treated as not answered.

## Filtering model

Demographic questions (declared through
[`Builder::demographics`](crate::Builder::demographics)) carry an
always-on inclusion-set filter over their declared options, with an
`"Other"` entry grouping out-of-vocabulary values when any exist in the
store. All remaining filtering happens through ad-hoc filters (a question,
a value, an optional negation) combined with a global AND/OR mode.

*/
